//! Publishing reports to a remote table.
//!
//! [`RowProjector`] flattens a [`ClientReport`](crate::models::ClientReport)
//! into [`TableRow`]s; [`TableSync`] writes them through any [`RemoteTable`].

pub mod bitable;
mod memory;
mod projector;
mod sync;

pub use bitable::BitableClient;
pub use memory::MemoryTable;
pub use projector::{RowProjector, ERROR_CURRENCY, METRIC_EQUITY, METRIC_FEE_TOTAL};
pub use sync::{coerce, SyncError, SyncReport, TableSync, BATCH_SIZE};

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Text format of timestamps in rows; also what datetime coercion parses.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Field values of one remote record keyed by remote field id.
pub type RecordFields = serde_json::Map<String, Value>;

/// Errors from a remote table backend.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unexpected response: {0}")]
    Malformed(String),
}

/// Value kind of a remote field, which decides how cells are coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    DateTime,
}

impl FieldKind {
    /// Bitable field type code: 2 is number, 5 is date-time, the rest is text.
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => FieldKind::Number,
            5 => FieldKind::DateTime,
            _ => FieldKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub remote_id: String,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, remote_id: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            remote_id: remote_id.into(),
            kind,
        }
    }
}

/// One page of record ids from a cursor listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPage {
    pub record_ids: Vec<String>,
    pub has_more: bool,
    pub page_token: Option<String>,
}

/// A tabular store addressed by table id.
#[async_trait]
pub trait RemoteTable: Send + Sync {
    async fn list_fields(&self, table: &str) -> Result<Vec<FieldDescriptor>, TableError>;

    async fn list_records(
        &self,
        table: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<RecordPage, TableError>;

    /// Create up to [`BATCH_SIZE`] records, returning how many were created.
    async fn batch_create(&self, table: &str, records: &[RecordFields]) -> Result<usize, TableError>;

    async fn batch_delete(&self, table: &str, record_ids: &[String]) -> Result<(), TableError>;
}

/// Semantic columns of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Client,
    Exchange,
    Account,
    Metric,
    Currency,
    Value,
    UpdatedAt,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::Client,
        Column::Exchange,
        Column::Account,
        Column::Metric,
        Column::Currency,
        Column::Value,
        Column::UpdatedAt,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Column::Client => "client",
            Column::Exchange => "exchange",
            Column::Account => "account",
            Column::Metric => "metric",
            Column::Currency => "currency",
            Column::Value => "value",
            Column::UpdatedAt => "updated_at",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Remote field names for each column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub client: String,
    pub exchange: String,
    pub account: String,
    pub metric: String,
    pub currency: String,
    pub value: String,
    pub updated_at: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            client: "Client".to_string(),
            exchange: "Exchange".to_string(),
            account: "Account".to_string(),
            metric: "Metric".to_string(),
            currency: "Currency".to_string(),
            value: "Value".to_string(),
            updated_at: "Updated At".to_string(),
        }
    }
}

impl ColumnNames {
    pub fn name(&self, column: Column) -> &str {
        match column {
            Column::Client => &self.client,
            Column::Exchange => &self.exchange,
            Column::Account => &self.account,
            Column::Metric => &self.metric,
            Column::Currency => &self.currency,
            Column::Value => &self.value,
            Column::UpdatedAt => &self.updated_at,
        }
    }
}

/// One flattened row: column → rendered value, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    cells: BTreeMap<Column, String>,
}

impl TableRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: Column, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: Column, value: impl Into<String>) {
        self.cells.insert(column, value.into());
    }

    pub fn get(&self, column: Column) -> Option<&str> {
        self.cells.get(&column).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> impl Iterator<Item = (Column, &str)> {
        self.cells.iter().map(|(c, v)| (*c, v.as_str()))
    }
}

impl Serialize for TableRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column.key(), value)?;
        }
        map.end()
    }
}
