use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde_json::Value;

use super::{
    Column, ColumnNames, FieldDescriptor, FieldKind, RecordFields, RemoteTable, TableError,
    TableRow, TIMESTAMP_FORMAT,
};

/// Most records the remote table accepts per create, delete or list call.
pub const BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Records created remotely.
    pub written: usize,
    /// Rows dropped because none of their columns mapped to a remote field.
    pub dropped: usize,
    /// Records removed before writing, when clearing was requested and worked.
    pub cleared: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A create batch failed. Earlier batches stay committed; later ones
    /// were not attempted.
    #[error("batch {batch} failed after {written} records were written: {source}")]
    Batch {
        batch: usize,
        written: usize,
        #[source]
        source: TableError,
    },
}

impl SyncError {
    pub fn written(&self) -> usize {
        match self {
            SyncError::Batch { written, .. } => *written,
        }
    }
}

/// Writes projected rows into one remote table.
pub struct TableSync<'a> {
    remote: &'a dyn RemoteTable,
    columns: ColumnNames,
}

impl<'a> TableSync<'a> {
    pub fn new(remote: &'a dyn RemoteTable, columns: ColumnNames) -> Self {
        Self { remote, columns }
    }

    pub async fn sync(
        &self,
        table: &str,
        rows: &[TableRow],
        clear_existing: bool,
    ) -> Result<SyncReport, SyncError> {
        let schema = self.schema(table).await;

        let records: Vec<RecordFields> = rows
            .iter()
            .map(|row| to_record(row, &schema))
            .filter(|record| !record.is_empty())
            .collect();
        let mut report = SyncReport {
            dropped: rows.len() - records.len(),
            ..SyncReport::default()
        };
        if report.dropped > 0 {
            tracing::warn!(table, dropped = report.dropped, "rows without any mapped field dropped");
        }

        if clear_existing {
            match self.clear(table).await {
                Ok(cleared) => {
                    tracing::info!(table, cleared, "cleared existing records");
                    report.cleared = Some(cleared);
                }
                Err(e) => tracing::warn!(table, error = %e, "clearing table failed; appending instead"),
            }
        }

        for (index, batch) in records.chunks(BATCH_SIZE).enumerate() {
            match self.remote.batch_create(table, batch).await {
                Ok(created) => {
                    report.written += created;
                    tracing::debug!(table, batch = index + 1, created, "batch written");
                }
                Err(source) => {
                    return Err(SyncError::Batch {
                        batch: index + 1,
                        written: report.written,
                        source,
                    });
                }
            }
        }

        tracing::info!(table, written = report.written, "sync finished");
        Ok(report)
    }

    /// Column → remote field. Without a schema every column name doubles as
    /// its own field id and is written as text.
    async fn schema(&self, table: &str) -> HashMap<Column, FieldDescriptor> {
        let fields = match self.remote.list_fields(table).await {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!(table, error = %e, "could not fetch table fields; using column names as field ids");
                return Column::ALL
                    .into_iter()
                    .map(|column| {
                        let name = self.columns.name(column);
                        (column, FieldDescriptor::new(name, name, FieldKind::Text))
                    })
                    .collect();
            }
        };

        let mut by_name: HashMap<&str, &FieldDescriptor> =
            fields.iter().map(|f| (f.name.as_str(), f)).collect();
        Column::ALL
            .into_iter()
            .filter_map(|column| {
                let name = self.columns.name(column);
                match by_name.remove(name) {
                    Some(field) => Some((column, field.clone())),
                    None => {
                        tracing::warn!(table, column = %column, field = name, "field not in table; skipping column");
                        None
                    }
                }
            })
            .collect()
    }

    async fn clear(&self, table: &str) -> Result<usize, TableError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .remote
                .list_records(table, page_token.as_deref(), BATCH_SIZE)
                .await?;
            ids.extend(page.record_ids);
            match page.page_token {
                Some(token) if page.has_more => page_token = Some(token),
                _ => break,
            }
        }

        for batch in ids.chunks(BATCH_SIZE) {
            self.remote.batch_delete(table, batch).await?;
        }
        Ok(ids.len())
    }
}

fn to_record(row: &TableRow, schema: &HashMap<Column, FieldDescriptor>) -> RecordFields {
    row.cells()
        .filter_map(|(column, raw)| {
            let field = schema.get(&column)?;
            Some((field.remote_id.clone(), coerce(field.kind, raw)))
        })
        .collect()
}

/// Convert a rendered cell to the JSON value the remote field expects.
/// Values that do not parse are sent as the raw string.
pub fn coerce(kind: FieldKind, raw: &str) -> Value {
    match kind {
        FieldKind::Text => Value::String(raw.to_string()),
        FieldKind::Number => raw
            .replace(',', "")
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        FieldKind::DateTime => NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
            .map(|dt| Value::from(dt.and_utc().timestamp_millis()))
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}
