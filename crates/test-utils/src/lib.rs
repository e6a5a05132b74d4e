//! Test support for the energy-feeds workspace.
//!
//! [`FeedDocumentBuilder`] and [`SeriesFixture`] write feed documents in
//! memory; [`find_test_file`] locates captured documents shipped under
//! `testdata/` directories.

pub mod fixtures;
pub mod paths;

pub use fixtures::*;
pub use paths::*;

/// Resolve a captured document by file name, or end the calling test early.
///
/// ```ignore
/// let path = require_test_file!("generation_forecast.xml");
/// let bytes = std::fs::read(path).unwrap();
/// ```
///
/// Captured documents can live outside the repository; point
/// `TEST_DATA_DIR` at them.
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        let Some(path) = $crate::find_test_file($name) else {
            eprintln!("SKIPPED: sample document '{}' not found (set TEST_DATA_DIR)", $name);
            return;
        };
        path
    }};
}

/// Assert two quantities agree within `tolerance`.
///
/// Aggregated feed values are sums of decimal text, so exact equality is
/// not always meaningful.
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $tolerance:expr) => {{
        let (actual, expected, tolerance) = ($actual as f64, $expected as f64, $tolerance as f64);
        assert!(
            (actual - expected).abs() <= tolerance,
            "assertion failed: {} is not within {} of {}",
            actual,
            tolerance,
            expected
        );
    }};
}
