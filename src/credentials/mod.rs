//! Exchange API credentials, grouped per client.
//!
//! Credentials live in a separate file from the main configuration so the
//! config can be shared without leaking secrets. TOML and JSON are accepted:
//!
//! ```toml
//! [[clients]]
//! name = "Customer_A"
//!
//! [clients.exchanges.okx.main]
//! api_key = "..."
//! secret = "..."
//! passphrase = "..."
//! ```
//!
//! Account entries missing either `api_key` or `secret` are dropped while
//! loading; nothing downstream ever sees a half-configured account.

mod file;

pub use file::{load_clients, parse_clients_json, parse_clients_toml};

use std::fmt;

use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};

/// One API key set for one exchange account.
#[derive(Clone)]
pub struct Credential {
    pub api_key: String,
    pub secret: SecretString,
    pub passphrase: Option<SecretString>,
}

impl Credential {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        let secret: String = secret.into();
        Self {
            api_key: api_key.into(),
            secret: SecretString::new(secret.into_boxed_str()),
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        let passphrase: String = passphrase.into();
        self.passphrase = Some(SecretString::new(passphrase.into_boxed_str()));
        self
    }

    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }

    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_ref().map(|p| p.expose_secret())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &mask(&self.api_key))
            .field("secret", &"[REDACTED]")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn mask(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{visible}…")
}

/// A client and every account it has configured: exchange id → account label → credential,
/// in the order the credentials file lists them.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub name: String,
    pub exchanges: IndexMap<String, IndexMap<String, Credential>>,
}

impl ClientConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exchanges: IndexMap::new(),
        }
    }

    pub fn with_account(
        mut self,
        exchange: impl Into<String>,
        account: impl Into<String>,
        credential: Credential,
    ) -> Self {
        self.exchanges
            .entry(exchange.into())
            .or_default()
            .insert(account.into(), credential);
        self
    }

    pub fn account_count(&self) -> usize {
        self.exchanges.values().map(IndexMap::len).sum()
    }
}
