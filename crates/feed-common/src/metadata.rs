//! Open metadata record attached to every series and record.
//!
//! The set of fields depends on the document type and on which tags differ
//! between sibling series, so it is kept as an ordered list of
//! `(field, value)` pairs rather than a fixed struct. Field order is the
//! insertion order and is preserved through every stage.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Ordered mapping of field name to string value.
///
/// Serializes as a map, keeping field order in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesMetadata {
    fields: Vec<(String, String)>,
}

impl SeriesMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(field, value)` pairs, later duplicates replacing earlier values.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut metadata = Self::new();
        for (field, value) in pairs {
            metadata.insert(field, value);
        }
        metadata
    }

    /// Set a field. An existing field keeps its position and takes the new value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Append every field of `other`, in its order.
    pub fn extend(&mut self, other: &SeriesMetadata) {
        for (field, value) in other.iter() {
            self.insert(field, value);
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Field names in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Restrict to `keys`, in the order given. Missing fields read as the empty string.
    pub fn project(&self, keys: &[String]) -> SeriesMetadata {
        SeriesMetadata {
            fields: keys
                .iter()
                .map(|key| (key.clone(), self.get(key).unwrap_or_default().to_string()))
                .collect(),
        }
    }

    /// Apply `f` to every value, keeping field order.
    pub fn map_values<F>(&self, mut f: F) -> SeriesMetadata
    where
        F: FnMut(&str, &str) -> String,
    {
        SeriesMetadata {
            fields: self
                .fields
                .iter()
                .map(|(name, value)| (name.clone(), f(name, value)))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SeriesMetadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

impl fmt::Display for SeriesMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return f.write_str("<no metadata>");
        }
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

impl Serialize for SeriesMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct MetadataVisitor;

impl<'de> Visitor<'de> for MetadataVisitor {
    type Value = SeriesMetadata;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of field names to string values")
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(SeriesMetadata::new())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut metadata = SeriesMetadata::new();
        while let Some((field, value)) = access.next_entry::<String, String>()? {
            metadata.insert(field, value);
        }
        Ok(metadata)
    }
}

impl<'de> Deserialize<'de> for SeriesMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MetadataVisitor)
    }
}
