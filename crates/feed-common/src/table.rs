//! Wide hourly table: one row per timestamp, one column per metric.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{FeedError, FeedResult};

/// Name of the key column when a table is persisted or displayed.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Timestamp-keyed table with a dynamic set of nullable `f64` columns.
///
/// Rows are unique and ascending by timestamp. A missing value is `None`;
/// rows are never dropped because one column has no data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideTable {
    columns: Vec<String>,
    rows: BTreeMap<NaiveDateTime, Vec<Option<f64>>>,
}

/// Result of pivoting long-form entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    pub table: WideTable,
    /// Entries dropped because their cell was already filled.
    pub collisions: usize,
}

impl WideTable {
    /// Empty table with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pivot `(timestamp, column, value)` entries into wide form.
    ///
    /// Columns come out sorted by name. Names that differ only in ASCII case
    /// are one column, spelled as the first in sort order. The first value
    /// seen for a cell wins. A column named like [`TIMESTAMP_COLUMN`] is
    /// kept here and rejected by [`check_columns`] before it is persisted.
    pub fn pivot<I>(entries: I) -> Pivot
    where
        I: IntoIterator<Item = (NaiveDateTime, String, f64)>,
    {
        let entries: Vec<_> = entries.into_iter().collect();

        // Names differing only in ASCII case share the first spelling's column.
        let names: BTreeSet<&str> = entries.iter().map(|(_, column, _)| column.as_str()).collect();
        let mut columns: Vec<String> = Vec::with_capacity(names.len());
        let mut folded: HashMap<String, usize> = HashMap::new();
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(names.len());
        for name in names {
            let next = columns.len();
            let slot = *folded.entry(name.to_ascii_lowercase()).or_insert(next);
            if slot == next {
                columns.push(name.to_string());
            }
            index.insert(name, slot);
        }

        let mut rows: BTreeMap<NaiveDateTime, Vec<Option<f64>>> = BTreeMap::new();
        let mut collisions = 0;
        for (timestamp, column, value) in &entries {
            let width = columns.len();
            let row = rows.entry(*timestamp).or_insert_with(|| vec![None; width]);
            let cell = &mut row[index[column.as_str()]];
            if cell.is_some() {
                collisions += 1;
            } else {
                *cell = Some(*value);
            }
        }

        Pivot {
            table: WideTable { columns, rows },
            collisions,
        }
    }

    /// Build from explicit columns and rows, validating shape and uniqueness.
    pub fn from_rows<I>(columns: Vec<String>, rows: I) -> FeedResult<Self>
    where
        I: IntoIterator<Item = (NaiveDateTime, Vec<Option<f64>>)>,
    {
        check_columns(&columns)?;

        let mut table = WideTable {
            columns,
            rows: BTreeMap::new(),
        };
        for (timestamp, values) in rows {
            if values.len() != table.columns.len() {
                return Err(FeedError::RowWidth {
                    timestamp: timestamp.to_string(),
                    expected: table.columns.len(),
                    found: values.len(),
                });
            }
            if table.rows.insert(timestamp, values).is_some() {
                return Err(FeedError::DuplicateTimestamp(timestamp.to_string()));
            }
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = &NaiveDateTime> {
        self.rows.keys()
    }

    /// Rows in ascending timestamp order.
    pub fn rows(&self) -> impl Iterator<Item = (&NaiveDateTime, &[Option<f64>])> {
        self.rows.iter().map(|(ts, values)| (ts, values.as_slice()))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of one cell; `None` when the row, column or value is missing.
    pub fn get(&self, timestamp: &NaiveDateTime, column: &str) -> Option<f64> {
        let index = self.column_index(column)?;
        self.rows.get(timestamp).and_then(|row| row[index])
    }

    /// Count of null cells per column, in column order.
    pub fn null_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let nulls = self.rows.values().filter(|row| row[i].is_none()).count();
                (name.clone(), nulls)
            })
            .collect()
    }

    /// Rename columns through `aliases`; unmapped columns keep their name and position.
    pub fn rename_columns(&self, aliases: &BTreeMap<String, String>) -> FeedResult<WideTable> {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|name| aliases.get(name).cloned().unwrap_or_else(|| name.clone()))
            .collect();
        check_columns(&columns)?;
        Ok(WideTable {
            columns,
            rows: self.rows.clone(),
        })
    }

    /// Full outer join on timestamp. Columns of `self` come first.
    pub fn outer_join(&self, other: &WideTable) -> FeedResult<WideTable> {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        check_columns(&columns)?;

        let left_width = self.columns.len();
        let right_width = other.columns.len();
        let mut rows: BTreeMap<NaiveDateTime, Vec<Option<f64>>> = BTreeMap::new();

        for (ts, values) in &self.rows {
            let mut row = values.clone();
            row.resize(left_width + right_width, None);
            rows.insert(*ts, row);
        }
        for (ts, values) in &other.rows {
            let row = rows
                .entry(*ts)
                .or_insert_with(|| vec![None; left_width + right_width]);
            row[left_width..].copy_from_slice(values);
        }

        Ok(WideTable { columns, rows })
    }
}

/// Check that column names are distinct from each other and from
/// [`TIMESTAMP_COLUMN`], ignoring ASCII case as SQL identifiers do.
pub fn check_columns(columns: &[String]) -> FeedResult<()> {
    let mut seen = HashSet::with_capacity(columns.len() + 1);
    seen.insert(TIMESTAMP_COLUMN.to_ascii_lowercase());
    for name in columns {
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(FeedError::DuplicateColumn(name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn hour(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_pivot_sorts_columns_and_rows() {
        let pivot = WideTable::pivot(vec![
            (hour(1), "wind".to_string(), 2.0),
            (hour(0), "solar".to_string(), 1.0),
            (hour(0), "wind".to_string(), 3.0),
        ]);
        let table = pivot.table;
        assert_eq!(table.columns(), &["solar".to_string(), "wind".to_string()]);
        assert_eq!(table.timestamps().cloned().collect::<Vec<_>>(), vec![hour(0), hour(1)]);
        assert_eq!(table.get(&hour(1), "solar"), None);
        assert_eq!(table.get(&hour(1), "wind"), Some(2.0));
        assert_eq!(pivot.collisions, 0);
    }

    #[test]
    fn test_pivot_first_value_wins() {
        let pivot = WideTable::pivot(vec![
            (hour(0), "price".to_string(), 50.0),
            (hour(0), "price".to_string(), 99.0),
        ]);
        assert_eq!(pivot.table.get(&hour(0), "price"), Some(50.0));
        assert_eq!(pivot.collisions, 1);
    }

    #[test]
    fn test_outer_join_keeps_all_rows() {
        let left = WideTable::pivot(vec![(hour(0), "a".to_string(), 1.0)]).table;
        let right = WideTable::pivot(vec![(hour(1), "b".to_string(), 2.0)]).table;
        let joined = left.outer_join(&right).unwrap();
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.get(&hour(0), "a"), Some(1.0));
        assert_eq!(joined.get(&hour(0), "b"), None);
        assert_eq!(joined.get(&hour(1), "b"), Some(2.0));
    }

    #[test]
    fn test_outer_join_rejects_duplicate_columns() {
        let left = WideTable::pivot(vec![(hour(0), "a".to_string(), 1.0)]).table;
        assert!(matches!(
            left.outer_join(&left),
            Err(FeedError::DuplicateColumn(name)) if name == "a"
        ));
    }

    #[test]
    fn test_pivot_folds_case_variants() {
        let pivot = WideTable::pivot(vec![
            (hour(0), "solar".to_string(), 1.0),
            (hour(1), "Solar".to_string(), 2.0),
            (hour(1), "solar".to_string(), 3.0),
        ]);
        assert_eq!(pivot.table.columns(), &["Solar".to_string()]);
        assert_eq!(pivot.table.get(&hour(0), "Solar"), Some(1.0));
        assert_eq!(pivot.table.get(&hour(1), "Solar"), Some(2.0));
        assert_eq!(pivot.collisions, 1);
        assert!(check_columns(pivot.table.columns()).is_ok());
    }

    #[test]
    fn test_columns_compare_case_insensitively() {
        let result = WideTable::from_rows(
            vec!["Solar".to_string(), "solar".to_string()],
            vec![(hour(0), vec![Some(1.0), Some(2.0)])],
        );
        assert!(matches!(result, Err(FeedError::DuplicateColumn(name)) if name == "solar"));

        let result = WideTable::from_rows(vec!["Timestamp".to_string()], vec![(hour(0), vec![None])]);
        assert!(matches!(result, Err(FeedError::DuplicateColumn(name)) if name == "Timestamp"));
    }

    #[test]
    fn test_rename_into_case_variant_is_rejected() {
        let table = WideTable::pivot(vec![
            (hour(0), "a".to_string(), 1.0),
            (hour(0), "b".to_string(), 2.0),
        ])
        .table;
        let aliases = BTreeMap::from([("b".to_string(), "A".to_string())]);
        assert!(matches!(
            table.rename_columns(&aliases),
            Err(FeedError::DuplicateColumn(name)) if name == "A"
        ));
    }

    #[test]
    fn test_from_rows_validates_width() {
        let result = WideTable::from_rows(vec!["a".to_string()], vec![(hour(0), vec![])]);
        assert!(matches!(result, Err(FeedError::RowWidth { expected: 1, found: 0, .. })));
    }
}
