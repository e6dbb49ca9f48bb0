use crate::config::ResolvedConfig;
use crate::duration::format_duration;

/// Resolved configuration as JSON. Secrets are never included.
pub fn config_output(config: &ResolvedConfig) -> serde_json::Value {
    let accounts: Vec<String> = config
        .client
        .exchanges
        .iter()
        .flat_map(|(exchange, accounts)| accounts.keys().map(move |a| format!("{exchange}/{a}")))
        .collect();

    serde_json::json!({
        "config_file": config.config_path.display().to_string(),
        "credentials_file": config.credentials_file.display().to_string(),
        "backup_path": config.backup_path.display().to_string(),
        "client": config.client.name,
        "accounts": accounts,
        "quote_currency": config.quote_currency,
        "alt_quote_currency": config.alt_quote_currency,
        "request_timeout": format_duration(config.request_timeout),
        "exchange_urls": config.exchange_urls,
        "table": config.table.as_ref().map(|table| serde_json::json!({
            "base_url": table.base_url,
            "app_id": table.app_id,
            "app_token": table.app_token,
            "table_id": table.table_id,
            "clear_existing": table.clear_existing,
            "columns": table.columns,
        })),
    })
}
