//! SQLite persistence of wide hourly tables using sqlx.
//!
//! Each table has a `timestamp TEXT PRIMARY KEY` column followed by one
//! `REAL` column per value column. Writes replace the whole table inside a
//! single transaction so a re-run never appends duplicates.

use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use feed_common::{check_columns, WideTable, TIMESTAMP_COLUMN};

use crate::error::{StorageError, StorageResult};

/// Text form of stored timestamps.
pub const STORED_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Null count of one value column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnNulls {
    pub column: String,
    pub nulls: u64,
}

/// Integrity summary of a stored table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableAudit {
    pub table: String,
    pub rows: u64,
    /// Timestamps that appear on more than one row.
    pub duplicate_timestamps: u64,
    pub null_timestamps: u64,
    pub first: Option<String>,
    pub last: Option<String>,
    pub null_counts: Vec<ColumnNulls>,
}

impl TableAudit {
    /// No duplicate and no missing timestamps.
    pub fn is_clean(&self) -> bool {
        self.duplicate_timestamps == 0 && self.null_timestamps == 0
    }
}

/// SQLite-backed table store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub async fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!(path = %path.display(), "Opened table database");
        Ok(Self { pool })
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub async fn table_exists(&self, name: &str) -> StorageResult<bool> {
        let found: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Replace the contents of table `name` with `table`.
    pub async fn replace_table(&self, name: &str, table: &WideTable) -> StorageResult<()> {
        let table_ident = quote_ident(name)?;
        // Checked before the transaction so a bad table never drops the old one.
        check_columns(table.columns())?;
        let mut column_defs = vec![format!("{} TEXT PRIMARY KEY", quote_ident(TIMESTAMP_COLUMN)?)];
        let mut column_idents = vec![quote_ident(TIMESTAMP_COLUMN)?];
        for column in table.columns() {
            let ident = quote_ident(column)?;
            column_defs.push(format!("{} REAL", ident));
            column_idents.push(ident);
        }

        let create = format!("CREATE TABLE {} ({})", table_ident, column_defs.join(", "));
        let placeholders = vec!["?"; column_idents.len()].join(", ");
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table_ident,
            column_idents.join(", "),
            placeholders
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table_ident))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&create).execute(&mut *tx).await?;

        for (timestamp, values) in table.rows() {
            let mut query = sqlx::query(&insert).bind(timestamp.format(STORED_TIMESTAMP_FORMAT).to_string());
            for value in values {
                query = query.bind(*value);
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!(
            table = %name,
            rows = table.len(),
            columns = table.columns().len(),
            "Replaced table"
        );
        Ok(())
    }

    /// Read table `name` back into a [`WideTable`].
    pub async fn load_table(&self, name: &str) -> StorageResult<WideTable> {
        let table_ident = quote_ident(name)?;
        let columns = self.value_columns(name).await?;

        let mut select_list = vec![quote_ident(TIMESTAMP_COLUMN)?];
        for column in &columns {
            select_list.push(quote_ident(column)?);
        }
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            select_list.join(", "),
            table_ident,
            quote_ident(TIMESTAMP_COLUMN)?
        );

        let rows: Vec<SqliteRow> = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let mut parsed = Vec::with_capacity(rows.len());
        for row in &rows {
            let raw: String = row.try_get(0)?;
            let timestamp = NaiveDateTime::parse_from_str(&raw, STORED_TIMESTAMP_FORMAT)
                .map_err(|_| StorageError::InvalidTimestamp(raw.clone()))?;
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(row.try_get::<Option<f64>, _>(i + 1)?);
            }
            parsed.push((timestamp, values));
        }

        debug!(table = %name, rows = parsed.len(), "Loaded table");
        Ok(WideTable::from_rows(columns, parsed)?)
    }

    /// Count rows, duplicate and missing timestamps, and nulls per column.
    pub async fn audit(&self, name: &str) -> StorageResult<TableAudit> {
        let table_ident = quote_ident(name)?;
        let ts = quote_ident(TIMESTAMP_COLUMN)?;
        let columns = self.value_columns(name).await?;

        let (rows,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table_ident))
            .fetch_one(&self.pool)
            .await?;

        let (duplicate_timestamps,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM (SELECT {ts} FROM {t} WHERE {ts} IS NOT NULL GROUP BY {ts} HAVING COUNT(*) > 1)",
            ts = ts,
            t = table_ident
        ))
        .fetch_one(&self.pool)
        .await?;

        let (null_timestamps,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {} WHERE {} IS NULL",
            table_ident, ts
        ))
        .fetch_one(&self.pool)
        .await?;

        let (first, last): (Option<String>, Option<String>) = sqlx::query_as(&format!(
            "SELECT MIN({ts}), MAX({ts}) FROM {t}",
            ts = ts,
            t = table_ident
        ))
        .fetch_one(&self.pool)
        .await?;

        let mut null_counts = Vec::with_capacity(columns.len());
        for column in columns {
            let (nulls,): (i64,) = sqlx::query_as(&format!(
                "SELECT COUNT(*) FROM {} WHERE {} IS NULL",
                table_ident,
                quote_ident(&column)?
            ))
            .fetch_one(&self.pool)
            .await?;
            null_counts.push(ColumnNulls {
                column,
                nulls: nulls as u64,
            });
        }

        Ok(TableAudit {
            table: name.to_string(),
            rows: rows as u64,
            duplicate_timestamps: duplicate_timestamps as u64,
            null_timestamps: null_timestamps as u64,
            first,
            last,
            null_counts,
        })
    }

    /// Value column names in table order, checking the key column exists.
    async fn value_columns(&self, name: &str) -> StorageResult<Vec<String>> {
        let info: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info(?) ORDER BY cid")
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
        if info.is_empty() {
            return Err(StorageError::TableNotFound(name.to_string()));
        }

        let mut has_key = false;
        let mut columns = Vec::with_capacity(info.len());
        for (column,) in info {
            if column == TIMESTAMP_COLUMN {
                has_key = true;
            } else {
                columns.push(column);
            }
        }
        if !has_key {
            return Err(StorageError::MissingKeyColumn {
                table: name.to_string(),
                column: TIMESTAMP_COLUMN.to_string(),
            });
        }
        Ok(columns)
    }
}

/// Double-quote an SQL identifier. Empty names and NUL bytes are rejected.
fn quote_ident(name: &str) -> StorageResult<String> {
    if name.is_empty() || name.contains('\0') {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}
