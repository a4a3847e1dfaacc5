//! Read-only query execution against MySQL.
//!
//! Validated SELECT statements run through the [`QueryExecutor`] trait;
//! the production implementation wraps a sqlx connection pool. Row values
//! are decoded into [`SqlValue`] with a try-get cascade ordered by type
//! likelihood, falling back to NULL for anything undecodable.

use crate::error::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sqlx::mysql::MySqlRow;
use sqlx::{Column, MySqlPool, Row};
use tracing::debug;

/// A SQL value that can be serialized to JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Decimal(Decimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    Bytes(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Convert to a display string.
    pub fn to_display_string(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(v) => v.to_string(),
            SqlValue::I64(v) => v.to_string(),
            SqlValue::F64(v) => v.to_string(),
            SqlValue::String(v) => v.clone(),
            SqlValue::Decimal(v) => v.to_string(),
            SqlValue::Date(v) => v.to_string(),
            SqlValue::DateTime(v) => v.to_string(),
            SqlValue::DateTimeUtc(v) => v.to_rfc3339(),
            SqlValue::Bytes(v) => format!("0x{}", hex_encode(v)),
        }
    }

    /// Decode one column of a MySQL row, trying types in order of
    /// likelihood.
    fn from_row_column(row: &MySqlRow, idx: usize) -> SqlValue {
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return SqlValue::String(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return SqlValue::I64(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return SqlValue::I64(v as i64);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return SqlValue::I64(v as i64);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i8>, _>(idx) {
            return SqlValue::I64(v as i64);
        }
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
            return SqlValue::I64(v as i64);
        }
        if let Ok(Some(v)) = row.try_get::<Option<Decimal>, _>(idx) {
            return SqlValue::Decimal(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return SqlValue::F64(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return SqlValue::F64(v as f64);
        }
        if let Ok(Some(v)) = row.try_get::<Option<bool>, _>(idx) {
            return SqlValue::Bool(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return SqlValue::DateTimeUtc(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return SqlValue::DateTime(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return SqlValue::Date(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            return SqlValue::Bytes(v);
        }
        SqlValue::Null
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// A materialized query result: column names plus decoded rows.
#[derive(Debug, Clone, Serialize, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Render the result as an aligned text table for the analysis prompt.
    pub fn to_table_string(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|v| v.to_display_string()).collect())
            .collect();
        for row in &rendered {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let format_row = |cells: &[String]| {
            cells
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
                .collect::<Vec<_>>()
                .join(" | ")
        };

        let mut out = Vec::with_capacity(self.rows.len() + 2);
        out.push(format_row(&self.columns));
        out.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        for row in &rendered {
            out.push(format_row(row));
        }
        out.join("\n")
    }

    /// Render rows as JSON objects keyed by column name.
    pub fn to_records(&self) -> serde_json::Value {
        let records: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                let obj: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .zip(row.iter())
                    .map(|(c, v)| (c.clone(), json!(v)))
                    .collect();
                serde_json::Value::Object(obj)
            })
            .collect();
        serde_json::Value::Array(records)
    }
}

/// Execution seam so the pipeline can run against a scripted backend in
/// tests.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryResult, ServiceError>;
}

/// MySQL executor over a sqlx connection pool.
pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryResult, ServiceError> {
        debug!(sql_chars = sql.len(), "executing validated query");

        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        let columns = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let decoded = rows
            .iter()
            .map(|row| {
                (0..row.columns().len())
                    .map(|idx| SqlValue::from_row_column(row, idx))
                    .collect()
            })
            .collect();

        Ok(QueryResult {
            columns,
            rows: decoded,
        })
    }
}
