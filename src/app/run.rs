use std::sync::Arc;

use anyhow::{Context, Result};

use crate::aggregate::AccountAggregator;
use crate::backup::write_backup;
use crate::clock::Clock;
use crate::config::{ResolvedConfig, ResolvedTable};
use crate::exchange::ExchangeRegistry;
use crate::models::ClientReport;
use crate::table::{BitableClient, MemoryTable, RemoteTable, RowProjector, TableRow, TableSync};
use crate::valuation::EquityResolver;

use super::{RunOutput, SyncOutput};

/// Where `run` sends the projected rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTarget {
    /// The configured remote table.
    Remote,
    /// An in-memory table with the configured columns.
    DryRun,
    /// Backup only.
    Skip,
}

pub fn build_aggregator(config: &ResolvedConfig, clock: Arc<dyn Clock>) -> AccountAggregator {
    let registry = ExchangeRegistry::with_default_venues(config.venue_options(clock));
    AccountAggregator::new(registry, EquityResolver::new(config.price_resolver()))
}

pub fn bitable_client(
    table: &ResolvedTable,
    config: &ResolvedConfig,
    clock: Arc<dyn Clock>,
) -> Result<BitableClient> {
    BitableClient::new(&table.app_id, table.app_secret.clone(), &table.app_token)
        .with_base_url(&table.base_url)
        .with_clock(clock)
        .with_timeout(config.request_timeout)
        .context("Failed to build table client")
}

/// Aggregate the active client and project its rows, without writing anything.
pub async fn collect_rows(
    config: &ResolvedConfig,
    aggregator: &AccountAggregator,
    clock: &dyn Clock,
) -> (ClientReport, Vec<TableRow>) {
    let report = aggregator.aggregate(&config.client).await;
    let rows = RowProjector::new(&config.quote_currency).project(&report, clock.now());
    (report, rows)
}

pub async fn run(
    config: &ResolvedConfig,
    aggregator: &AccountAggregator,
    clock: Arc<dyn Clock>,
    target: SyncTarget,
) -> Result<RunOutput> {
    match (target, &config.table) {
        (SyncTarget::Skip, _) => run_with_remote(config, aggregator, clock.as_ref(), None).await,
        (_, None) => {
            tracing::info!("no [table] configured; writing backup only");
            run_with_remote(config, aggregator, clock.as_ref(), None).await
        }
        (SyncTarget::DryRun, Some(table)) => {
            let memory = MemoryTable::new()
                .with_table(&table.table_id, MemoryTable::schema_for(&table.columns));
            let mut output = run_with_remote(config, aggregator, clock.as_ref(), Some(&memory)).await?;
            if let Some(sync) = output.sync.as_mut() {
                sync.dry_run = true;
            }
            Ok(output)
        }
        (SyncTarget::Remote, Some(table)) => {
            let remote = bitable_client(table, config, clock.clone())?;
            run_with_remote(config, aggregator, clock.as_ref(), Some(&remote)).await
        }
    }
}

/// Aggregate, back up, then sync into `remote` when both a remote and table
/// settings are present. The backup is written before any sync is attempted;
/// a failed backup is logged and reported but does not stop the sync.
pub async fn run_with_remote(
    config: &ResolvedConfig,
    aggregator: &AccountAggregator,
    clock: &dyn Clock,
    remote: Option<&dyn RemoteTable>,
) -> Result<RunOutput> {
    let (report, rows) = collect_rows(config, aggregator, clock).await;

    let backup_error = match write_backup(&config.backup_path, std::slice::from_ref(&report)).await {
        Ok(()) => None,
        Err(e) => {
            let error = format!("{e:#}");
            tracing::warn!(
                path = %config.backup_path.display(),
                error = %error,
                "backup failed; continuing with sync"
            );
            Some(error)
        }
    };

    let failed_accounts = report
        .accounts()
        .filter(|(_, account)| !account.equity.is_ok())
        .map(|(identity, _)| identity.to_string())
        .collect();

    let sync = match (remote, &config.table) {
        (Some(remote), Some(table)) => Some(publish(remote, table, &rows).await?),
        _ => None,
    };

    Ok(RunOutput {
        client: report.client.clone(),
        accounts: report.account_count(),
        failed_accounts,
        rows: rows.len(),
        backup_path: config.backup_path.clone(),
        backup_error,
        sync,
    })
}

pub async fn publish(
    remote: &dyn RemoteTable,
    table: &ResolvedTable,
    rows: &[TableRow],
) -> Result<SyncOutput> {
    if rows.is_empty() {
        tracing::warn!(table = %table.table_id, "no rows to write");
        return Ok(SyncOutput {
            table: table.table_id.clone(),
            dry_run: false,
            written: 0,
            dropped: 0,
            cleared: None,
        });
    }

    let report = TableSync::new(remote, table.columns.clone())
        .sync(&table.table_id, rows, table.clear_existing)
        .await
        .with_context(|| format!("Failed to sync table {}", table.table_id))?;

    Ok(SyncOutput {
        table: table.table_id.clone(),
        dry_run: false,
        written: report.written,
        dropped: report.dropped,
        cleared: report.cleared,
    })
}
