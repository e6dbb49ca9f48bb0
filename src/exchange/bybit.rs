//! Bybit v5 connector (unified trading account).

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::credentials::Credential;
use crate::models::{normalize_symbol, pair, AssetSnapshot, Fee, PriceSnapshot, Withdrawal};

use super::parse::{array_at, f64_field, f64_or_zero, millis, str_field};
use super::{
    split_concatenated_symbol, ExchangeClient, ExchangeError, RestClient, Signer,
    UnifiedAssetBalance, VenueOptions,
};

pub const ID: &str = "bybit";
const API_BASE: &str = "https://api.bybit.com";

pub struct BybitClient {
    rest: RestClient,
}

impl BybitClient {
    pub fn new(credential: Credential, options: &VenueOptions) -> Result<Self, ExchangeError> {
        let base_url = options.base_url(ID, API_BASE);
        Ok(Self {
            rest: RestClient::new(ID, base_url, credential, Signer::Bybit, options)?,
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)], signed: bool) -> Result<Value, ExchangeError> {
        let body = if signed {
            self.rest.signed_get(path, query).await?
        } else {
            self.rest.public_get(path, query).await?
        };
        check_envelope(body)
    }

    async fn unified_wallet(&self) -> Result<Value, ExchangeError> {
        let result = self
            .get(
                "/v5/account/wallet-balance",
                &[("accountType", "UNIFIED".to_string())],
                true,
            )
            .await?;
        array_at(&result, "/list", ID)?
            .into_iter()
            .next()
            .cloned()
            .ok_or_else(|| ExchangeError::malformed(ID, "empty wallet list"))
    }
}

fn check_envelope(body: Value) -> Result<Value, ExchangeError> {
    let code = body.get("retCode").and_then(Value::as_i64).unwrap_or(-1);
    if code != 0 {
        return Err(ExchangeError::Api {
            exchange: ID.to_string(),
            code: code.to_string(),
            message: str_field(&body, "retMsg").unwrap_or_default(),
        });
    }
    Ok(body.get("result").cloned().unwrap_or(Value::Null))
}

fn parse_withdrawal(item: &Value) -> Option<Withdrawal> {
    Some(Withdrawal {
        time: millis(item, "createTime")?,
        currency: normalize_symbol(&str_field(item, "coin")?),
        amount: f64_field(item, "amount")?,
        status: str_field(item, "status"),
        tx_id: str_field(item, "txID"),
        raw: item.clone(),
    })
}

fn parse_execution(item: &Value) -> Option<Fee> {
    let (base, quote) = split_concatenated_symbol(&str_field(item, "symbol")?)?;
    // Spot executions name the fee coin; older records leave it blank, in
    // which case the fee was charged in the quote leg.
    let fee_currency = str_field(item, "feeCurrency")
        .map(|c| normalize_symbol(&c))
        .unwrap_or_else(|| quote.clone());
    Some(Fee {
        time: millis(item, "execTime")?,
        symbol: pair(&base, &quote),
        side: str_field(item, "side").unwrap_or_default().to_lowercase(),
        fee_amount: f64_or_zero(item, "execFee").abs(),
        fee_currency,
        trade_id: str_field(item, "execId").unwrap_or_default(),
        price: f64_or_zero(item, "execPrice"),
        size: f64_or_zero(item, "execQty"),
        raw: item.clone(),
    })
}

#[async_trait::async_trait]
impl ExchangeClient for BybitClient {
    fn id(&self) -> &str {
        ID
    }

    async fn fetch_balance(&self) -> Result<AssetSnapshot, ExchangeError> {
        let wallet = self.unified_wallet().await?;
        Ok(array_at(&wallet, "/coin", ID)?
            .into_iter()
            .filter_map(|c| {
                Some((
                    normalize_symbol(&str_field(c, "coin")?),
                    f64_field(c, "walletBalance")?,
                ))
            })
            .filter(|(_, qty)| *qty > 0.0)
            .collect())
    }

    async fn fetch_tickers(&self) -> Result<PriceSnapshot, ExchangeError> {
        let result = self
            .get("/v5/market/tickers", &[("category", "spot".to_string())], false)
            .await?;
        Ok(array_at(&result, "/list", ID)?
            .into_iter()
            .filter_map(|t| {
                let (base, quote) = split_concatenated_symbol(&str_field(t, "symbol")?)?;
                Some((pair(&base, &quote), f64_field(t, "lastPrice")))
            })
            .collect())
    }

    async fn fetch_native_equity(&self) -> Result<f64, ExchangeError> {
        let wallet = self.unified_wallet().await?;
        f64_field(&wallet, "totalEquity")
            .ok_or_else(|| ExchangeError::malformed(ID, "totalEquity missing or not numeric"))
    }

    async fn fetch_unified_balances(&self) -> Result<Vec<UnifiedAssetBalance>, ExchangeError> {
        let wallet = self.unified_wallet().await?;
        Ok(array_at(&wallet, "/coin", ID)?
            .into_iter()
            .filter_map(|c| {
                let asset = normalize_symbol(&str_field(c, "coin")?);
                Some(
                    UnifiedAssetBalance::new(asset, f64_field(c, "walletBalance")?)
                        .with_pnl(f64_or_zero(c, "unrealisedPnl"), 0.0),
                )
            })
            .collect())
    }

    async fn fetch_withdrawals(&self, limit: usize) -> Result<Vec<Withdrawal>, ExchangeError> {
        let result = self
            .get(
                "/v5/asset/withdraw/query-record",
                &[("limit", limit.to_string())],
                true,
            )
            .await?;
        Ok(array_at(&result, "/rows", ID)?
            .into_iter()
            .filter_map(parse_withdrawal)
            .collect())
    }

    async fn fetch_trades(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Fee>, ExchangeError> {
        let result = self
            .get(
                "/v5/execution/list",
                &[
                    ("category", "spot".to_string()),
                    ("startTime", since.timestamp_millis().to_string()),
                    ("limit", limit.min(100).to_string()),
                ],
                true,
            )
            .await?;
        Ok(array_at(&result, "/list", ID)?
            .into_iter()
            .filter_map(parse_execution)
            .collect())
    }
}
