use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::clock::Clock;
use crate::credentials::{load_clients, ClientConfig};
use crate::duration::deserialize_duration;
use crate::exchange::VenueOptions;
use crate::table::bitable::DEFAULT_BASE_URL;
use crate::table::ColumnNames;
use crate::valuation::PriceResolver;

pub const CONFIG_FILE_NAME: &str = "equisync.toml";

fn default_credentials_file() -> PathBuf {
    PathBuf::from("clients.toml")
}

fn default_backup_path() -> PathBuf {
    PathBuf::from("balances_report.json")
}

fn default_quote_currency() -> String {
    "USDT".to_string()
}

fn default_alt_quote_currency() -> Option<String> {
    Some("USDC".to_string())
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_table_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_clear_existing() -> bool {
    true
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(SecretString::new(s.into_boxed_str()))
}

/// Remote table settings (`[table]`).
#[derive(Clone, Deserialize)]
pub struct TableConfig {
    #[serde(default = "default_table_base_url")]
    pub base_url: String,

    pub app_id: String,

    #[serde(deserialize_with = "deserialize_secret")]
    pub app_secret: SecretString,

    /// Bitable app (base) holding the tables.
    pub app_token: String,

    /// Table used for clients without an explicit route.
    #[serde(default)]
    pub default_table: Option<String>,

    /// Delete every existing record before writing.
    #[serde(default = "default_clear_existing")]
    pub clear_existing: bool,

    /// Client name → table id.
    #[serde(default)]
    pub routes: BTreeMap<String, String>,

    #[serde(default)]
    pub columns: ColumnNames,
}

impl fmt::Debug for TableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableConfig")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("app_token", &self.app_token)
            .field("default_table", &self.default_table)
            .field("clear_existing", &self.clear_existing)
            .field("routes", &self.routes)
            .field("columns", &self.columns)
            .finish()
    }
}

impl TableConfig {
    /// Target table for `client`: its route, else the default table.
    pub fn table_for(&self, client: &str) -> Option<&str> {
        self.routes
            .get(client)
            .or(self.default_table.as_ref())
            .map(String::as_str)
    }
}

/// Application configuration as written in `equisync.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Client to process on this run.
    #[serde(default)]
    pub active_client: Option<String>,

    /// Credentials file. If relative, resolved from the config file location.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,

    /// Local JSON backup. If relative, resolved from the config file location.
    #[serde(default = "default_backup_path")]
    pub backup_path: PathBuf,

    #[serde(default = "default_quote_currency")]
    pub quote_currency: String,

    /// Stable coin priced at parity with the quote currency.
    #[serde(default = "default_alt_quote_currency")]
    pub alt_quote_currency: Option<String>,

    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,

    /// Exchange id → API base URL override.
    #[serde(default)]
    pub exchange_urls: HashMap<String, String>,

    #[serde(default)]
    pub table: Option<TableConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            active_client: None,
            credentials_file: default_credentials_file(),
            backup_path: default_backup_path(),
            quote_currency: default_quote_currency(),
            alt_quote_currency: default_alt_quote_currency(),
            request_timeout: default_request_timeout(),
            exchange_urls: HashMap::new(),
            table: None,
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    fn resolve_path(path: &Path, config_dir: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            config_dir.join(path)
        }
    }
}

/// Remote table settings narrowed to the active client.
#[derive(Debug, Clone)]
pub struct ResolvedTable {
    pub base_url: String,
    pub app_id: String,
    pub app_secret: SecretString,
    pub app_token: String,
    pub table_id: String,
    pub clear_existing: bool,
    pub columns: ColumnNames,
}

/// Everything one run needs, validated before any network activity.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config_path: PathBuf,
    pub credentials_file: PathBuf,
    pub backup_path: PathBuf,
    pub client: ClientConfig,
    pub quote_currency: String,
    pub alt_quote_currency: Option<String>,
    pub request_timeout: Duration,
    pub exchange_urls: HashMap<String, String>,
    pub table: Option<ResolvedTable>,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./equisync.toml` if it exists in current directory
/// 2. `~/.local/share/equisync/equisync.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from(CONFIG_FILE_NAME);
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("equisync").join(CONFIG_FILE_NAME);
    }

    local_config
}

impl ResolvedConfig {
    /// Load config and the active client's credentials.
    pub fn load(config_path: &Path) -> Result<Self> {
        Self::load_for_client(config_path, None)
    }

    /// Like [`ResolvedConfig::load`], with `client` taking precedence over
    /// `active_client`.
    pub fn load_for_client(config_path: &Path, client: Option<&str>) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;
        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        let config = Config::load(&config_path)?;

        let client_name = client
            .map(str::to_string)
            .or(config.active_client.clone())
            .filter(|name| !name.trim().is_empty())
            .context("No active client configured; set active_client or pass --client")?;

        let credentials_file = Config::resolve_path(&config.credentials_file, config_dir);
        if !credentials_file.exists() {
            anyhow::bail!("Credentials file not found: {}", credentials_file.display());
        }
        let clients = load_clients(&credentials_file)?;
        let known: Vec<&str> = clients.iter().map(|c| c.name.as_str()).collect();
        let client = clients
            .iter()
            .find(|c| c.name == client_name)
            .cloned()
            .with_context(|| {
                format!(
                    "Client '{client_name}' not found in {} (known: {})",
                    credentials_file.display(),
                    known.join(", ")
                )
            })?;

        let table = match &config.table {
            Some(table) => {
                let table_id = table.table_for(&client.name).with_context(|| {
                    format!("No table route for client '{}' and no default_table", client.name)
                })?;
                Some(ResolvedTable {
                    base_url: table.base_url.clone(),
                    app_id: table.app_id.clone(),
                    app_secret: table.app_secret.clone(),
                    app_token: table.app_token.clone(),
                    table_id: table_id.to_string(),
                    clear_existing: table.clear_existing,
                    columns: table.columns.clone(),
                })
            }
            None => None,
        };

        Ok(Self {
            backup_path: Config::resolve_path(&config.backup_path, config_dir),
            config_path: config_path.clone(),
            credentials_file,
            client,
            quote_currency: config.quote_currency.to_uppercase(),
            alt_quote_currency: config.alt_quote_currency.map(|c| c.to_uppercase()),
            request_timeout: config.request_timeout,
            exchange_urls: config.exchange_urls,
            table,
        })
    }

    pub fn price_resolver(&self) -> PriceResolver {
        let resolver = PriceResolver::new(&self.quote_currency);
        match &self.alt_quote_currency {
            Some(alt) => resolver.with_alt_quote(alt),
            None => resolver,
        }
    }

    pub fn venue_options(&self, clock: Arc<dyn Clock>) -> VenueOptions {
        let mut options = VenueOptions::default()
            .with_quote(&self.quote_currency)
            .with_timeout(self.request_timeout)
            .with_clock(clock);
        for (exchange, url) in &self.exchange_urls {
            options = options.with_base_url(exchange, url);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const CLIENTS: &str = r#"
[[clients]]
name = "Customer_A"

[clients.exchanges.okx.main]
api_key = "k"
secret = "s"
passphrase = "p"

[[clients]]
name = "Customer_B"

[clients.exchanges.binance.main]
api_key = "k"
secret = "s"
"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> Result<PathBuf> {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path)?;
        write!(file, "{content}")?;
        Ok(path)
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.quote_currency, "USDT");
        assert_eq!(config.alt_quote_currency.as_deref(), Some("USDC"));
        assert_eq!(config.request_timeout, Duration::from_secs(20));
        assert!(config.table.is_none());
    }

    #[test]
    fn test_load_empty_config() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write(&dir, CONFIG_FILE_NAME, "")?;

        let config = Config::load(&path)?;
        assert_eq!(config.credentials_file, PathBuf::from("clients.toml"));
        assert_eq!(config.backup_path, PathBuf::from("balances_report.json"));
        Ok(())
    }

    #[test]
    fn test_resolves_active_client_and_relative_paths() -> Result<()> {
        let dir = TempDir::new()?;
        write(&dir, "clients.toml", CLIENTS)?;
        let path = write(
            &dir,
            CONFIG_FILE_NAME,
            "active_client = \"Customer_A\"\nrequest_timeout = \"5s\"\nquote_currency = \"usdt\"\n",
        )?;

        let resolved = ResolvedConfig::load(&path)?;
        let root = dir.path().canonicalize()?;
        assert_eq!(resolved.client.name, "Customer_A");
        assert_eq!(resolved.client.account_count(), 1);
        assert_eq!(resolved.backup_path, root.join("balances_report.json"));
        assert_eq!(resolved.request_timeout, Duration::from_secs(5));
        assert_eq!(resolved.quote_currency, "USDT");
        assert!(resolved.table.is_none());
        Ok(())
    }

    #[test]
    fn test_client_override_wins() -> Result<()> {
        let dir = TempDir::new()?;
        write(&dir, "clients.toml", CLIENTS)?;
        let path = write(&dir, CONFIG_FILE_NAME, "active_client = \"Customer_A\"\n")?;

        let resolved = ResolvedConfig::load_for_client(&path, Some("Customer_B"))?;
        assert_eq!(resolved.client.name, "Customer_B");
        Ok(())
    }

    #[test]
    fn test_missing_active_client_is_fatal() -> Result<()> {
        let dir = TempDir::new()?;
        write(&dir, "clients.toml", CLIENTS)?;
        let path = write(&dir, CONFIG_FILE_NAME, "")?;

        let err = ResolvedConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("No active client"));
        Ok(())
    }

    #[test]
    fn test_unknown_client_is_fatal() -> Result<()> {
        let dir = TempDir::new()?;
        write(&dir, "clients.toml", CLIENTS)?;
        let path = write(&dir, CONFIG_FILE_NAME, "active_client = \"Nobody\"\n")?;

        let err = ResolvedConfig::load(&path).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'Nobody' not found"));
        assert!(message.contains("Customer_A, Customer_B"));
        Ok(())
    }

    #[test]
    fn test_missing_credentials_file_is_fatal() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write(&dir, CONFIG_FILE_NAME, "active_client = \"Customer_A\"\n")?;

        let err = ResolvedConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Credentials file not found"));
        Ok(())
    }

    #[test]
    fn test_table_routes_fall_back_to_default_table() -> Result<()> {
        let dir = TempDir::new()?;
        write(&dir, "clients.toml", CLIENTS)?;
        let path = write(
            &dir,
            CONFIG_FILE_NAME,
            r#"
active_client = "Customer_B"

[table]
app_id = "cli_x"
app_secret = "shh"
app_token = "bascn"
default_table = "tblDefault"

[table.routes]
Customer_A = "tblA"

[table.columns]
value = "Balance"
"#,
        )?;

        let resolved = ResolvedConfig::load(&path)?;
        let table = resolved.table.context("table settings")?;
        assert_eq!(table.table_id, "tblDefault");
        assert!(table.clear_existing);
        assert_eq!(table.base_url, DEFAULT_BASE_URL);
        assert_eq!(table.columns.value, "Balance");
        assert!(!format!("{table:?}").contains("shh"));

        let config = Config::load(&path)?;
        assert_eq!(config.table.as_ref().and_then(|t| t.table_for("Customer_A")), Some("tblA"));
        Ok(())
    }
}
