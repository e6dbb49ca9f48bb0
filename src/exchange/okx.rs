//! OKX v5 connector.
//!
//! `GET /api/v5/account/balance` already carries `totalEq`, the venue's own
//! USD-denominated valuation of the trading account, so OKX answers the
//! native-equity strategy directly.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::credentials::Credential;
use crate::models::{normalize_symbol, pair, AssetSnapshot, Fee, PriceSnapshot, Withdrawal};

use super::parse::{array_at, f64_field, f64_or_zero, millis, str_field};
use super::{ExchangeClient, ExchangeError, RestClient, Signer, VenueOptions};

pub const ID: &str = "okx";
const API_BASE: &str = "https://www.okx.com";

pub struct OkxClient {
    rest: RestClient,
}

impl OkxClient {
    pub fn new(credential: Credential, options: &VenueOptions) -> Result<Self, ExchangeError> {
        let base_url = options.base_url(ID, API_BASE);
        Ok(Self {
            rest: RestClient::new(ID, base_url, credential, Signer::Okx, options)?,
        })
    }

    /// Signed GET that unwraps the `{code, msg, data}` envelope.
    async fn get(&self, path: &str, query: &[(&str, String)], signed: bool) -> Result<Value, ExchangeError> {
        let body = if signed {
            self.rest.signed_get(path, query).await?
        } else {
            self.rest.public_get(path, query).await?
        };
        check_envelope(body)
    }

    async fn account_balance(&self) -> Result<Value, ExchangeError> {
        let data = self.get("/api/v5/account/balance", &[], true).await?;
        data.as_array()
            .and_then(|items| items.first())
            .cloned()
            .ok_or_else(|| ExchangeError::malformed(ID, "empty account balance"))
    }
}

fn check_envelope(body: Value) -> Result<Value, ExchangeError> {
    let code = str_field(&body, "code").unwrap_or_default();
    if code != "0" {
        return Err(ExchangeError::Api {
            exchange: ID.to_string(),
            code,
            message: str_field(&body, "msg").unwrap_or_default(),
        });
    }
    Ok(body.get("data").cloned().unwrap_or(Value::Null))
}

/// `BTC-USDT` → `BTC/USDT`.
fn unify_inst_id(inst_id: &str) -> Option<String> {
    let (base, quote) = inst_id.split_once('-')?;
    Some(pair(base, quote))
}

fn parse_withdrawal(item: &Value) -> Option<Withdrawal> {
    Some(Withdrawal {
        time: millis(item, "ts")?,
        currency: normalize_symbol(&str_field(item, "ccy")?),
        amount: f64_field(item, "amt")?,
        status: str_field(item, "state"),
        tx_id: str_field(item, "txId"),
        raw: item.clone(),
    })
}

fn parse_fill(item: &Value) -> Option<Fee> {
    Some(Fee {
        time: millis(item, "ts")?,
        symbol: unify_inst_id(&str_field(item, "instId")?)?,
        side: str_field(item, "side").unwrap_or_default(),
        // OKX reports fees as negative balance deltas.
        fee_amount: f64_or_zero(item, "fee").abs(),
        fee_currency: normalize_symbol(&str_field(item, "feeCcy").unwrap_or_default()),
        trade_id: str_field(item, "tradeId").unwrap_or_default(),
        price: f64_or_zero(item, "fillPx"),
        size: f64_or_zero(item, "fillSz"),
        raw: item.clone(),
    })
}

#[async_trait::async_trait]
impl ExchangeClient for OkxClient {
    fn id(&self) -> &str {
        ID
    }

    async fn fetch_balance(&self) -> Result<AssetSnapshot, ExchangeError> {
        let account = self.account_balance().await?;
        let details = array_at(&account, "/details", ID)?;
        Ok(details
            .into_iter()
            .filter_map(|d| Some((normalize_symbol(&str_field(d, "ccy")?), f64_field(d, "eq")?)))
            .filter(|(_, qty)| *qty > 0.0)
            .collect())
    }

    async fn fetch_tickers(&self) -> Result<PriceSnapshot, ExchangeError> {
        let data = self
            .get("/api/v5/market/tickers", &[("instType", "SPOT".to_string())], false)
            .await?;
        let items = array_at(&data, "", ID)?;
        Ok(items
            .into_iter()
            .filter_map(|t| Some((unify_inst_id(&str_field(t, "instId")?)?, f64_field(t, "last"))))
            .collect())
    }

    async fn fetch_native_equity(&self) -> Result<f64, ExchangeError> {
        let account = self.account_balance().await?;
        f64_field(&account, "totalEq")
            .ok_or_else(|| ExchangeError::malformed(ID, "totalEq missing or not numeric"))
    }

    async fn fetch_withdrawals(&self, limit: usize) -> Result<Vec<Withdrawal>, ExchangeError> {
        let data = self
            .get("/api/v5/asset/withdrawal-history", &[("limit", limit.to_string())], true)
            .await?;
        Ok(array_at(&data, "", ID)?
            .into_iter()
            .filter_map(parse_withdrawal)
            .collect())
    }

    async fn fetch_trades(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Fee>, ExchangeError> {
        let data = self
            .get(
                "/api/v5/trade/fills-history",
                &[
                    ("instType", "SPOT".to_string()),
                    ("begin", since.timestamp_millis().to_string()),
                    ("limit", limit.min(100).to_string()),
                ],
                true,
            )
            .await?;
        Ok(array_at(&data, "", ID)?
            .into_iter()
            .filter_map(parse_fill)
            .collect())
    }
}
