use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    Column, ColumnNames, FieldDescriptor, FieldKind, RecordFields, RecordPage, RemoteTable,
    TableError,
};

#[derive(Debug, Default)]
struct Table {
    fields: Option<Vec<FieldDescriptor>>,
    records: Vec<(String, RecordFields)>,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, Table>,
    next_id: u64,
    create_batches: Vec<usize>,
    fail_create_call: Option<usize>,
}

/// Remote table kept in memory. Backs `--dry-run` and tests.
#[derive(Debug, Default)]
pub struct MemoryTable {
    state: Mutex<State>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table with the given schema.
    pub fn with_table(self, table: &str, fields: Vec<FieldDescriptor>) -> Self {
        self.lock().tables.entry(table.to_string()).or_default().fields = Some(fields);
        self
    }

    /// Add a table whose schema cannot be read.
    pub fn with_schemaless_table(self, table: &str) -> Self {
        self.lock().tables.entry(table.to_string()).or_default().fields = None;
        self
    }

    /// Make the `call`-th (1-based) `batch_create` fail.
    pub fn fail_create_on_call(self, call: usize) -> Self {
        self.lock().fail_create_call = Some(call);
        self
    }

    /// One field per column, named as configured, ids `fld_<column>`.
    pub fn schema_for(columns: &ColumnNames) -> Vec<FieldDescriptor> {
        Column::ALL
            .into_iter()
            .map(|column| {
                let kind = match column {
                    Column::Value => FieldKind::Number,
                    Column::UpdatedAt => FieldKind::DateTime,
                    _ => FieldKind::Text,
                };
                FieldDescriptor::new(columns.name(column), format!("fld_{}", column.key()), kind)
            })
            .collect()
    }

    pub fn records(&self, table: &str) -> Vec<RecordFields> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.records.iter().map(|(_, r)| r.clone()).collect())
            .unwrap_or_default()
    }

    pub fn record_count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, |t| t.records.len())
    }

    /// Size of every `batch_create` call so far, failed ones included.
    pub fn create_batches(&self) -> Vec<usize> {
        self.lock().create_batches.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn missing(table: &str) -> TableError {
    TableError::Api {
        code: 404,
        message: format!("table {table} not found"),
    }
}

#[async_trait]
impl RemoteTable for MemoryTable {
    async fn list_fields(&self, table: &str) -> Result<Vec<FieldDescriptor>, TableError> {
        let state = self.lock();
        let t = state.tables.get(table).ok_or_else(|| missing(table))?;
        t.fields
            .clone()
            .ok_or_else(|| TableError::Malformed(format!("schema of {table} unavailable")))
    }

    async fn list_records(
        &self,
        table: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<RecordPage, TableError> {
        let state = self.lock();
        let t = state.tables.get(table).ok_or_else(|| missing(table))?;
        let start = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| TableError::Malformed(format!("bad page token {token}")))?,
            None => 0,
        };
        let end = (start + page_size.max(1)).min(t.records.len());
        let has_more = end < t.records.len();
        Ok(RecordPage {
            record_ids: t.records[start.min(end)..end].iter().map(|(id, _)| id.clone()).collect(),
            has_more,
            page_token: has_more.then(|| end.to_string()),
        })
    }

    async fn batch_create(&self, table: &str, records: &[RecordFields]) -> Result<usize, TableError> {
        let mut state = self.lock();
        state.create_batches.push(records.len());
        if state.fail_create_call == Some(state.create_batches.len()) {
            return Err(TableError::Api {
                code: 1254000,
                message: "injected failure".to_string(),
            });
        }

        let first_id = state.next_id;
        state.next_id += records.len() as u64;
        let t = state.tables.get_mut(table).ok_or_else(|| missing(table))?;
        t.records.extend(
            records
                .iter()
                .enumerate()
                .map(|(i, r)| (format!("rec{}", first_id + i as u64), r.clone())),
        );
        Ok(records.len())
    }

    async fn batch_delete(&self, table: &str, record_ids: &[String]) -> Result<(), TableError> {
        let mut state = self.lock();
        let t = state.tables.get_mut(table).ok_or_else(|| missing(table))?;
        t.records.retain(|(id, _)| !record_ids.contains(id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pages_through_records() {
        let table = MemoryTable::new().with_table("t", Vec::new());
        let records = vec![RecordFields::new(); 5];
        table.batch_create("t", &records).await.unwrap();

        let first = table.list_records("t", None, 2).await.unwrap();
        assert_eq!(first.record_ids, vec!["rec0", "rec1"]);
        assert!(first.has_more);

        let last = table.list_records("t", Some("4"), 2).await.unwrap();
        assert_eq!(last.record_ids, vec!["rec4"]);
        assert!(!last.has_more);
        assert!(last.page_token.is_none());
    }
}
