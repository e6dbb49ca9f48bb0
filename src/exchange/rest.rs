use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::Value;
use sha2::{Digest, Sha256, Sha512};

use crate::clock::Clock;
use crate::credentials::Credential;

use super::{ExchangeError, VenueOptions};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

const BINANCE_RECV_WINDOW: &str = "10000";
const BYBIT_RECV_WINDOW: &str = "5000";

/// Request-signing scheme of a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signer {
    /// HMAC-SHA256 over the query string, hex, appended as `signature`.
    Binance,
    /// HMAC-SHA256 over `timestamp + method + path?query`, base64, in headers.
    Okx,
    /// HMAC-SHA256 over `timestamp + key + recv_window + query`, hex, in headers.
    Bybit,
    /// HMAC-SHA512 over method, path, query, body hash and timestamp, hex, in headers.
    Gate,
}

/// Signed JSON-over-HTTP transport shared by the venue connectors.
pub struct RestClient {
    exchange: String,
    base_url: String,
    client: Client,
    credential: Credential,
    signer: Signer,
    clock: Arc<dyn Clock>,
}

impl RestClient {
    pub fn new(
        exchange: &str,
        base_url: &str,
        credential: Credential,
        signer: Signer,
        options: &VenueOptions,
    ) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .user_agent(concat!("equisync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            exchange: exchange.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            credential,
            signer,
            clock: options.clock.clone(),
        })
    }

    /// Unauthenticated GET.
    pub async fn public_get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ExchangeError> {
        self.send(path, &build_query(query), Vec::new()).await
    }

    /// Authenticated GET, signed according to the venue's scheme.
    pub async fn signed_get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ExchangeError> {
        let query = build_query(query);
        let (query, headers) = self.sign(path, query)?;
        self.send(path, &query, headers).await
    }

    fn sign(
        &self,
        path: &str,
        query: String,
    ) -> Result<(String, Vec<(&'static str, String)>), ExchangeError> {
        let key = self.credential.api_key.clone();
        let secret = self.credential.secret();
        let now = self.clock.now();

        match self.signer {
            Signer::Binance => {
                let mut query = query;
                if !query.is_empty() {
                    query.push('&');
                }
                query.push_str(&format!(
                    "recvWindow={BINANCE_RECV_WINDOW}&timestamp={}",
                    now.timestamp_millis()
                ));
                let signature = hmac_sha256_hex(secret, &query);
                query.push_str(&format!("&signature={signature}"));
                Ok((query, vec![("X-MBX-APIKEY", key)]))
            }
            Signer::Okx => {
                let passphrase = self.credential.passphrase().ok_or_else(|| {
                    ExchangeError::Credentials("okx requires a passphrase".to_string())
                })?;
                let timestamp = now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
                let prehash = format!("{timestamp}GET{}", request_path(path, &query));
                let signature = hmac_sha256_base64(secret, &prehash);
                Ok((
                    query,
                    vec![
                        ("OK-ACCESS-KEY", key),
                        ("OK-ACCESS-SIGN", signature),
                        ("OK-ACCESS-TIMESTAMP", timestamp),
                        ("OK-ACCESS-PASSPHRASE", passphrase.to_string()),
                    ],
                ))
            }
            Signer::Bybit => {
                let timestamp = now.timestamp_millis().to_string();
                let prehash = format!("{timestamp}{key}{BYBIT_RECV_WINDOW}{query}");
                let signature = hmac_sha256_hex(secret, &prehash);
                Ok((
                    query,
                    vec![
                        ("X-BAPI-API-KEY", key),
                        ("X-BAPI-SIGN", signature),
                        ("X-BAPI-TIMESTAMP", timestamp),
                        ("X-BAPI-RECV-WINDOW", BYBIT_RECV_WINDOW.to_string()),
                    ],
                ))
            }
            Signer::Gate => {
                let timestamp = now.timestamp().to_string();
                let body_hash = hex::encode(Sha512::digest(b""));
                let prehash = format!("GET\n{path}\n{query}\n{body_hash}\n{timestamp}");
                let signature = hmac_sha512_hex(secret, &prehash);
                Ok((
                    query,
                    vec![
                        ("KEY", key),
                        ("Timestamp", timestamp),
                        ("SIGN", signature),
                    ],
                ))
            }
        }
    }

    async fn send(
        &self,
        path: &str,
        query: &str,
        headers: Vec<(&'static str, String)>,
    ) -> Result<Value, ExchangeError> {
        let url = format!("{}{}", self.base_url, request_path(path, query));

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/json");
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ExchangeError::Http {
                exchange: self.exchange.clone(),
                status: status.as_u16(),
                body: truncate(&body, 300),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            ExchangeError::malformed(&self.exchange, format!("invalid JSON from {path}: {e}"))
        })
    }
}

fn request_path(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

/// Query string in the given order, values percent-encoded.
fn build_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key can be any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn hmac_sha256_base64(secret: &str, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key can be any size");
    mac.update(message.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

fn hmac_sha512_hex(secret: &str, message: &str) -> String {
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC key can be any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
