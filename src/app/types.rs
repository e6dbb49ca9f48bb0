use std::path::PathBuf;

use serde::Serialize;

/// JSON output of a table sync
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutput {
    pub table: String,
    pub dry_run: bool,
    pub written: usize,
    pub dropped: usize,
    pub cleared: Option<usize>,
}

/// JSON output of `run`
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub client: String,
    pub accounts: usize,
    pub failed_accounts: Vec<String>,
    pub rows: usize,
    pub backup_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_error: Option<String>,
    pub sync: Option<SyncOutput>,
}
