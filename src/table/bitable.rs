//! Feishu / Lark Bitable backend.
//!
//! Authenticates as an internal app (`app_id` + `app_secret`) and reuses the
//! tenant access token until shortly before it expires.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};

use super::{FieldDescriptor, FieldKind, RecordFields, RecordPage, RemoteTable, TableError};

pub const DEFAULT_BASE_URL: &str = "https://open.feishu.cn/open-apis";
/// Tokens are refreshed this many seconds before the server-side expiry.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 300;
const FIELD_PAGE_SIZE: usize = 100;
/// Lifetime assumed when the token response omits `expire`.
const DEFAULT_TOKEN_TTL_SECS: i64 = 7200;

fn default_expire() -> i64 {
    DEFAULT_TOKEN_TTL_SECS
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

/// Common `{code, msg, data}` response shape.
#[derive(Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

pub struct BitableClient {
    base_url: String,
    app_id: String,
    app_secret: SecretString,
    app_token: String,
    client: Client,
    clock: Arc<dyn Clock>,
    token: Mutex<Option<CachedToken>>,
}

impl BitableClient {
    pub fn new(app_id: impl Into<String>, app_secret: SecretString, app_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            app_id: app_id.into(),
            app_secret,
            app_token: app_token.into(),
            client: Client::new(),
            clock: Arc::new(SystemClock),
            token: Mutex::new(None),
        }
    }

    /// Override API base URL (useful for tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, TableError> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    fn table_url(&self, table: &str, suffix: &str) -> String {
        format!(
            "{}/bitable/v1/apps/{}/tables/{}/{}",
            self.base_url, self.app_token, table, suffix
        )
    }

    /// Cached tenant token, fetching a fresh one when missing or near expiry.
    async fn access_token(&self) -> Result<String, TableError> {
        let mut cached = self.token.lock().await;
        let now = self.clock.now();
        if let Some(token) = cached.as_ref() {
            if now < token.expires_at {
                return Ok(token.token.expose_secret().to_string());
            }
        }

        #[derive(Serialize)]
        struct Request<'a> {
            app_id: &'a str,
            app_secret: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            code: i64,
            #[serde(default)]
            msg: String,
            tenant_access_token: Option<String>,
            #[serde(default = "default_expire")]
            expire: i64,
        }

        let url = format!("{}/auth/v3/tenant_access_token/internal", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&Request {
                app_id: &self.app_id,
                app_secret: self.app_secret.expose_secret(),
            })
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TableError::Auth(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        let parsed: Response = serde_json::from_str(&body)
            .map_err(|e| TableError::Auth(format!("invalid token response: {e}")))?;
        let token = match (parsed.code, parsed.tenant_access_token) {
            (0, Some(token)) => token,
            (code, _) => return Err(TableError::Auth(format!("code {code}: {}", parsed.msg))),
        };

        let expires_at = now + chrono::Duration::seconds(parsed.expire - TOKEN_EXPIRY_MARGIN_SECS);
        tracing::debug!(expires_at = %expires_at, "fetched tenant access token");
        *cached = Some(CachedToken {
            token: SecretString::new(token.clone().into_boxed_str()),
            expires_at,
        });
        Ok(token)
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, TableError> {
        let token = self.access_token().await?;
        let request = self.client.get(url).bearer_auth(token).query(query);
        self.send(request).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<T, TableError> {
        let token = self.access_token().await?;
        let request = self.client.post(url).bearer_auth(token).json(body);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, TableError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TableError::Http {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| TableError::Malformed(format!("invalid JSON: {e}")))?;
        if envelope.code != 0 {
            return Err(TableError::Api {
                code: envelope.code,
                message: envelope.msg,
            });
        }
        envelope
            .data
            .ok_or_else(|| TableError::Malformed("response has no data".to_string()))
    }
}

#[async_trait]
impl RemoteTable for BitableClient {
    async fn list_fields(&self, table: &str) -> Result<Vec<FieldDescriptor>, TableError> {
        #[derive(Deserialize)]
        struct Field {
            field_name: String,
            field_id: String,
            #[serde(rename = "type", default)]
            kind: i64,
        }

        #[derive(Deserialize)]
        struct Page {
            #[serde(default)]
            items: Option<Vec<Field>>,
            #[serde(default)]
            has_more: bool,
            page_token: Option<String>,
        }

        let url = self.table_url(table, "fields");
        let mut fields = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("page_size", FIELD_PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("page_token", token.clone()));
            }
            let page: Page = self.get(&url, &query).await?;
            fields.extend(
                page.items
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|f| !f.field_name.is_empty() && !f.field_id.is_empty())
                    .map(|f| FieldDescriptor::new(f.field_name, f.field_id, FieldKind::from_code(f.kind))),
            );
            match page.page_token {
                Some(token) if page.has_more => page_token = Some(token),
                _ => break,
            }
        }
        Ok(fields)
    }

    async fn list_records(
        &self,
        table: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<RecordPage, TableError> {
        #[derive(Deserialize)]
        struct Record {
            record_id: String,
        }

        #[derive(Deserialize)]
        struct Page {
            #[serde(default)]
            items: Option<Vec<Record>>,
            #[serde(default)]
            has_more: bool,
            page_token: Option<String>,
        }

        let mut query = vec![("page_size", page_size.to_string())];
        if let Some(token) = page_token {
            query.push(("page_token", token.to_string()));
        }
        let page: Page = self.get(&self.table_url(table, "records"), &query).await?;
        Ok(RecordPage {
            record_ids: page
                .items
                .unwrap_or_default()
                .into_iter()
                .map(|r| r.record_id)
                .collect(),
            has_more: page.has_more,
            page_token: page.page_token,
        })
    }

    async fn batch_create(&self, table: &str, records: &[RecordFields]) -> Result<usize, TableError> {
        #[derive(Serialize)]
        struct Record<'a> {
            fields: &'a RecordFields,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            records: Vec<Record<'a>>,
        }

        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            records: Vec<serde_json::Value>,
        }

        let request = Request {
            records: records.iter().map(|fields| Record { fields }).collect(),
        };
        let response: Response = self
            .post(&self.table_url(table, "records/batch_create"), &request)
            .await?;
        Ok(response.records.len())
    }

    async fn batch_delete(&self, table: &str, record_ids: &[String]) -> Result<(), TableError> {
        #[derive(Serialize)]
        struct Request<'a> {
            records: &'a [String],
        }

        let _: serde_json::Value = self
            .post(
                &self.table_url(table, "records/batch_delete"),
                &Request { records: record_ids },
            )
            .await?;
        Ok(())
    }
}
