//! Gate.io v4 connector.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::credentials::Credential;
use crate::models::{normalize_symbol, pair, AssetSnapshot, Fee, PriceSnapshot, Withdrawal};

use super::parse::{array, f64_field, f64_or_zero, number, seconds, str_field};
use super::{
    ExchangeClient, ExchangeError, RestClient, Signer, UnifiedAssetBalance, VenueOptions,
};

pub const ID: &str = "gate";
const API_BASE: &str = "https://api.gateio.ws";

pub struct GateClient {
    rest: RestClient,
    quote: String,
}

impl GateClient {
    pub fn new(credential: Credential, options: &VenueOptions) -> Result<Self, ExchangeError> {
        let base_url = options.base_url(ID, API_BASE);
        Ok(Self {
            rest: RestClient::new(ID, base_url, credential, Signer::Gate, options)?,
            quote: options.quote.clone(),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)], signed: bool) -> Result<Value, ExchangeError> {
        let body = if signed {
            self.rest.signed_get(path, query).await?
        } else {
            self.rest.public_get(path, query).await?
        };
        check_error(body)
    }
}

/// Gate answers errors as `{label, message}` objects.
fn check_error(body: Value) -> Result<Value, ExchangeError> {
    if let Some(label) = str_field(&body, "label") {
        return Err(ExchangeError::Api {
            exchange: ID.to_string(),
            code: label,
            message: str_field(&body, "message").unwrap_or_default(),
        });
    }
    Ok(body)
}

/// `BTC_USDT` → `BTC/USDT`.
fn unify_currency_pair(currency_pair: &str) -> Option<String> {
    let (base, quote) = currency_pair.split_once('_')?;
    Some(pair(base, quote))
}

/// Per-currency unified balance: `equity` when the account reports it,
/// otherwise available plus frozen funds.
fn unified_entry(asset: &str, entry: &Value) -> UnifiedAssetBalance {
    let balance = f64_field(entry, "equity")
        .unwrap_or_else(|| f64_or_zero(entry, "available") + f64_or_zero(entry, "freeze"));
    UnifiedAssetBalance::new(normalize_symbol(asset), balance)
}

fn parse_withdrawal(item: &Value) -> Option<Withdrawal> {
    Some(Withdrawal {
        time: seconds(item, "timestamp")?,
        currency: normalize_symbol(&str_field(item, "currency")?),
        amount: f64_field(item, "amount")?,
        status: str_field(item, "status"),
        tx_id: str_field(item, "txid"),
        raw: item.clone(),
    })
}

fn parse_trade(item: &Value) -> Option<Fee> {
    // `create_time_ms` is fractional milliseconds as a string.
    let time = f64_field(item, "create_time_ms")
        .and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single())
        .or_else(|| seconds(item, "create_time"))?;
    Some(Fee {
        time,
        symbol: unify_currency_pair(&str_field(item, "currency_pair")?)?,
        side: str_field(item, "side").unwrap_or_default(),
        fee_amount: f64_or_zero(item, "fee").abs(),
        fee_currency: normalize_symbol(&str_field(item, "fee_currency").unwrap_or_default()),
        trade_id: str_field(item, "id").unwrap_or_default(),
        price: f64_or_zero(item, "price"),
        size: f64_or_zero(item, "amount"),
        raw: item.clone(),
    })
}

#[async_trait::async_trait]
impl ExchangeClient for GateClient {
    fn id(&self) -> &str {
        ID
    }

    async fn fetch_balance(&self) -> Result<AssetSnapshot, ExchangeError> {
        let body = self.get("/api/v4/spot/accounts", &[], true).await?;
        Ok(array(&body, ID, "spot accounts")?
            .iter()
            .filter_map(|a| {
                let qty = f64_or_zero(a, "available") + f64_or_zero(a, "locked");
                Some((normalize_symbol(&str_field(a, "currency")?), qty))
            })
            .filter(|(_, qty)| *qty > 0.0)
            .collect())
    }

    async fn fetch_tickers(&self) -> Result<PriceSnapshot, ExchangeError> {
        let body = self.get("/api/v4/spot/tickers", &[], false).await?;
        Ok(array(&body, ID, "tickers")?
            .iter()
            .filter_map(|t| {
                Some((
                    unify_currency_pair(&str_field(t, "currency_pair")?)?,
                    f64_field(t, "last"),
                ))
            })
            .collect())
    }

    async fn fetch_native_equity(&self) -> Result<f64, ExchangeError> {
        let body = self
            .get(
                "/api/v4/wallet/total_balance",
                &[("currency", self.quote.clone())],
                true,
            )
            .await?;
        body.pointer("/total/amount")
            .and_then(number)
            .ok_or_else(|| ExchangeError::malformed(ID, "total.amount missing or not numeric"))
    }

    async fn fetch_unified_balances(&self) -> Result<Vec<UnifiedAssetBalance>, ExchangeError> {
        let body = self.get("/api/v4/unified/accounts", &[], true).await?;
        let balances = body
            .get("balances")
            .and_then(Value::as_object)
            .ok_or_else(|| ExchangeError::malformed(ID, "unified account has no balances"))?;
        Ok(balances
            .iter()
            .map(|(asset, entry)| unified_entry(asset, entry))
            .collect())
    }

    async fn fetch_withdrawals(&self, limit: usize) -> Result<Vec<Withdrawal>, ExchangeError> {
        let body = self
            .get("/api/v4/wallet/withdrawals", &[("limit", limit.to_string())], true)
            .await?;
        Ok(array(&body, ID, "withdrawals")?
            .iter()
            .filter_map(parse_withdrawal)
            .collect())
    }

    async fn fetch_trades(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Fee>, ExchangeError> {
        let body = self
            .get(
                "/api/v4/spot/my_trades",
                &[
                    ("from", since.timestamp().to_string()),
                    ("limit", limit.to_string()),
                ],
                true,
            )
            .await?;
        Ok(array(&body, ID, "trades")?
            .iter()
            .filter_map(parse_trade)
            .collect())
    }
}
