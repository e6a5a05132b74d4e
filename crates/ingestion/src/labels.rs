//! Code to label lookup tables.
//!
//! Tables are keyed by metadata field name, then by code:
//!
//! ```yaml
//! MktPSRType:
//!   B16: Solar
//!   B19: Wind Onshore
//! documentType:
//!   A69: Wind and solar forecast
//! ```
//!
//! Unknown fields and unknown codes pass through unchanged.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use feed_common::SeriesMetadata;

use crate::error::Result;

/// Per-field code translations supplied as configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelTables {
    tables: BTreeMap<String, BTreeMap<String, String>>,
}

impl LabelTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, code: impl Into<String>, label: impl Into<String>) {
        self.tables
            .entry(field.into())
            .or_default()
            .insert(code.into(), label.into());
    }

    /// Parse the YAML form.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Load from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let tables = Self::from_yaml_str(&contents)?;
        debug!(
            path = %path.display(),
            fields = tables.tables.len(),
            codes = tables.len(),
            "Loaded label tables"
        );
        Ok(tables)
    }

    /// Label for `code` under `field`, or the code itself.
    pub fn label<'a>(&'a self, field: &str, code: &'a str) -> &'a str {
        self.tables
            .get(field)
            .and_then(|codes| codes.get(code))
            .map(String::as_str)
            .unwrap_or(code)
    }

    /// Translate every value of `metadata`, keeping field order.
    pub fn translate(&self, metadata: &SeriesMetadata) -> SeriesMetadata {
        metadata.map_values(|field, value| self.label(field, value).to_string())
    }

    /// Total number of codes across all fields.
    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
