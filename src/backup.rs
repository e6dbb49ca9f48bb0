//! Local JSON copy of every client report, written before any remote sync.

use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tokio::fs;

use crate::models::{AccountReport, ClientReport};

type BackupDocument<'a> = IndexMap<&'a str, &'a IndexMap<String, IndexMap<String, AccountReport>>>;

/// Write `client → exchange → account → report` as pretty JSON, replacing
/// any existing file.
pub async fn write_backup(path: &Path, reports: &[ClientReport]) -> Result<()> {
    let document: BackupDocument<'_> = reports
        .iter()
        .map(|report| (report.client.as_str(), &report.exchanges))
        .collect();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .context("Failed to create backup directory")?;
    }
    let content = serde_json::to_string_pretty(&document).context("Failed to serialize backup")?;
    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write backup to {}", path.display()))?;

    tracing::info!(path = %path.display(), clients = reports.len(), "backup written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountIdentity, EquityResult, ValuationBasis};

    #[tokio::test]
    async fn backup_is_keyed_by_client() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("balances_report.json");

        let report: ClientReport = vec![(
            AccountIdentity::new("Customer_A", "okx", "main"),
            AccountReport::new(EquityResult::valued(1000.0, ValuationBasis::Native), Vec::new(), Vec::new(), "USDT"),
        )]
        .into_iter()
        .collect();

        write_backup(&path, &[report]).await?;

        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        let account = &written["Customer_A"]["okx"]["main"];
        assert_eq!(account["equity"]["status"], "valued");
        assert_eq!(account["equity"]["total"], 1000.0);
        assert_eq!(account["withdrawals"], serde_json::json!([]));
        Ok(())
    }
}
