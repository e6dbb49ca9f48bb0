use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

use super::{ClientConfig, Credential};

#[derive(Debug, Deserialize)]
struct ClientsFile {
    #[serde(default)]
    clients: Vec<RawClient>,
}

#[derive(Debug, Deserialize)]
struct RawClient {
    name: String,
    #[serde(default)]
    exchanges: IndexMap<String, IndexMap<String, RawCredential>>,
}

/// The two accepted JSON layouts. Deserialized directly so object key order
/// survives.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClientsJson {
    Bare(Vec<RawClient>),
    Wrapped(ClientsFile),
}

#[derive(Debug, Default, Deserialize)]
struct RawCredential {
    #[serde(default, alias = "apiKey")]
    api_key: Option<String>,
    #[serde(default)]
    secret: Option<String>,
    #[serde(default, alias = "password")]
    passphrase: Option<String>,
}

impl RawCredential {
    fn into_credential(self) -> Option<Credential> {
        let api_key = self.api_key.filter(|k| !k.trim().is_empty())?;
        let secret = self.secret.filter(|s| !s.trim().is_empty())?;
        let credential = Credential::new(api_key, secret);
        Some(match self.passphrase.filter(|p| !p.is_empty()) {
            Some(passphrase) => credential.with_passphrase(passphrase),
            None => credential,
        })
    }
}

impl RawClient {
    fn into_client(self) -> ClientConfig {
        let mut client = ClientConfig::new(self.name);
        for (exchange, accounts) in self.exchanges {
            let exchange = exchange.trim().to_lowercase();
            for (account, raw) in accounts {
                match raw.into_credential() {
                    Some(credential) => {
                        client = client.with_account(exchange.clone(), account, credential);
                    }
                    None => tracing::debug!(
                        client = %client.name,
                        exchange = %exchange,
                        account = %account,
                        "Skipping account without api key or secret"
                    ),
                }
            }
        }
        client
    }
}

/// Parse the TOML form (`[[clients]]` tables).
pub fn parse_clients_toml(content: &str) -> Result<Vec<ClientConfig>> {
    let file: ClientsFile = toml::from_str(content).context("Failed to parse clients TOML")?;
    Ok(file.clients.into_iter().map(RawClient::into_client).collect())
}

/// Parse the JSON form: either `{"clients": [...]}` or a bare array of clients.
pub fn parse_clients_json(content: &str) -> Result<Vec<ClientConfig>> {
    let raw = match serde_json::from_str(content).context("Failed to parse clients JSON")? {
        ClientsJson::Bare(clients) => clients,
        ClientsJson::Wrapped(file) => file.clients,
    };
    Ok(raw.into_iter().map(RawClient::into_client).collect())
}

/// Load every client from a credentials file. The format follows the extension.
pub fn load_clients(path: &Path) -> Result<Vec<ClientConfig>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials file: {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let clients = if is_json {
        parse_clients_json(&content)
    } else {
        parse_clients_toml(&content)
    };
    clients.with_context(|| format!("Invalid credentials file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_drops_accounts_missing_key_or_secret() -> Result<()> {
        let clients = parse_clients_toml(
            r#"
[[clients]]
name = "Customer_A"

[clients.exchanges.OKX.main]
api_key = "k1"
secret = "s1"
passphrase = "p1"

[clients.exchanges.okx.sub_1]
api_key = "k2"

[clients.exchanges.binance.main]
api_key = ""
secret = "s3"

[clients.exchanges.gate.main]
api_key = "k4"
secret = "s4"
"#,
        )?;

        assert_eq!(clients.len(), 1);
        let client = &clients[0];
        assert_eq!(client.name, "Customer_A");
        assert_eq!(client.account_count(), 2);
        let okx = &client.exchanges["okx"];
        assert_eq!(okx["main"].passphrase(), Some("p1"));
        assert!(!okx.contains_key("sub_1"));
        assert!(!client.exchanges.contains_key("binance"));
        assert!(client.exchanges["gate"]["main"].passphrase().is_none());
        Ok(())
    }

    #[test]
    fn json_accepts_camel_case_keys_and_bare_arrays() -> Result<()> {
        let clients = parse_clients_json(
            r#"[
                {
                    "name": "Customer_B",
                    "exchanges": {
                        "okx": {
                            "main": { "apiKey": "k", "secret": "s", "password": "pass" }
                        },
                        "bybit": {
                            "main": { "apiKey": "k" }
                        }
                    }
                }
            ]"#,
        )?;

        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].account_count(), 1);
        assert_eq!(clients[0].exchanges["okx"]["main"].passphrase(), Some("pass"));
        Ok(())
    }

    #[test]
    fn accounts_keep_file_order() -> Result<()> {
        let clients = parse_clients_toml(
            r#"
[[clients]]
name = "Customer_A"

[clients.exchanges.okx.main]
api_key = "k"
secret = "s"

[clients.exchanges.okx.sub_2]
api_key = "k"
secret = "s"

[clients.exchanges.okx.sub_10]
api_key = "k"
secret = "s"

[clients.exchanges.binance.main]
api_key = "k"
secret = "s"
"#,
        )?;

        let client = &clients[0];
        let exchanges: Vec<&str> = client.exchanges.keys().map(String::as_str).collect();
        assert_eq!(exchanges, vec!["okx", "binance"]);
        let okx: Vec<&str> = client.exchanges["okx"].keys().map(String::as_str).collect();
        assert_eq!(okx, vec!["main", "sub_2", "sub_10"]);

        let clients = parse_clients_json(
            r#"{"clients": [{"name": "C", "exchanges": {
                "gate": {"z": {"api_key": "k", "secret": "s"}, "a": {"api_key": "k", "secret": "s"}},
                "bybit": {"main": {"api_key": "k", "secret": "s"}}
            }}]}"#,
        )?;
        let order: Vec<String> = clients[0]
            .exchanges
            .iter()
            .flat_map(|(exchange, accounts)| accounts.keys().map(move |a| format!("{exchange}/{a}")))
            .collect();
        assert_eq!(order, vec!["gate/z", "gate/a", "bybit/main"]);
        Ok(())
    }

    #[test]
    fn load_reads_by_extension() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("clients.json");
        std::fs::write(
            &path,
            r#"{"clients": [{"name": "C", "exchanges": {"gate": {"main": {"api_key": "k", "secret": "s"}}}}]}"#,
        )?;

        let clients = load_clients(&path)?;
        assert_eq!(clients[0].account_count(), 1);

        assert!(load_clients(&dir.path().join("missing.toml")).is_err());
        Ok(())
    }
}
