//! Market feed XML reader.
//!
//! [`Document`] parses raw bytes and answers namespace-qualified path queries;
//! [`extract`] turns a parsed document into typed [`TimeSeries`], discovering
//! the value field and the metadata tags that distinguish sibling series.

pub mod document;
pub mod extract;

pub use document::{Document, Node};
pub use extract::{
    extract, sniff, DocumentSchema, Extraction, Point, RawPoint, Resolution, TimeSeries,
    ValueField, STRUCTURAL_TAGS,
};
