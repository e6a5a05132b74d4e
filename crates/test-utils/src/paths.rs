//! Locating captured feed documents.

use std::path::{Path, PathBuf};

/// Member directories that may hold a `testdata/` folder, searched in order.
const TESTDATA_MEMBERS: [&str; 3] = ["crates/feed-xml", "crates/ingestion", "services/ingester"];

/// Workspace root: two levels above this crate's manifest (`crates/test-utils`).
pub fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .unwrap_or(manifest_dir)
        .to_path_buf()
}

/// First existing `name` under `$TEST_DATA_DIR`, a member's `testdata/`,
/// or the workspace-level `testdata/`.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let root = workspace_root();
    let override_dir = std::env::var_os("TEST_DATA_DIR").map(PathBuf::from);

    override_dir
        .into_iter()
        .chain(TESTDATA_MEMBERS.iter().map(|member| root.join(member).join("testdata")))
        .chain(std::iter::once(root.join("testdata")))
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}
