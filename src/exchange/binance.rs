//! Binance connector: spot REST plus the portfolio-margin (`papi`) API for
//! unified accounts.

use serde_json::Value;

use crate::credentials::Credential;
use crate::models::{normalize_symbol, pair, AssetSnapshot, PriceSnapshot, Withdrawal};

use super::parse::{array, f64_field, f64_or_zero, str_field, utc_datetime};
use super::{
    split_concatenated_symbol, ExchangeClient, ExchangeError, RestClient, Signer,
    UnifiedAssetBalance, VenueOptions,
};

pub const ID: &str = "binance";
const API_BASE: &str = "https://api.binance.com";
const PAPI_BASE: &str = "https://papi.binance.com";

pub struct BinanceClient {
    spot: RestClient,
    papi: RestClient,
    quote: String,
}

impl BinanceClient {
    pub fn new(credential: Credential, options: &VenueOptions) -> Result<Self, ExchangeError> {
        let spot = options.base_url(ID, API_BASE);
        let papi = options.base_url(ID, PAPI_BASE);
        Ok(Self {
            spot: RestClient::new(ID, spot, credential.clone(), Signer::Binance, options)?,
            papi: RestClient::new(ID, papi, credential, Signer::Binance, options)?,
            quote: options.quote.clone(),
        })
    }
}

fn parse_withdrawal(item: &Value) -> Option<Withdrawal> {
    Some(Withdrawal {
        time: utc_datetime(item, "applyTime")?,
        currency: normalize_symbol(&str_field(item, "coin")?),
        amount: f64_field(item, "amount")?,
        status: str_field(item, "status"),
        tx_id: str_field(item, "txId"),
        raw: item.clone(),
    })
}

/// Sum of the per-wallet `balance` figures, which Binance already expresses
/// in the requested quote asset. Wallets without a numeric balance are ignored.
fn sum_wallet_balances(wallets: &[Value]) -> Option<f64> {
    let balances: Vec<f64> = wallets.iter().filter_map(|w| f64_field(w, "balance")).collect();
    if balances.is_empty() {
        None
    } else {
        Some(balances.iter().sum())
    }
}

#[async_trait::async_trait]
impl ExchangeClient for BinanceClient {
    fn id(&self) -> &str {
        ID
    }

    async fn fetch_balance(&self) -> Result<AssetSnapshot, ExchangeError> {
        let account = self.spot.signed_get("/api/v3/account", &[]).await?;
        let balances = account
            .get("balances")
            .ok_or_else(|| ExchangeError::malformed(ID, "account has no balances"))?;
        Ok(array(balances, ID, "balances")?
            .iter()
            .filter_map(|b| {
                let qty = f64_or_zero(b, "free") + f64_or_zero(b, "locked");
                Some((normalize_symbol(&str_field(b, "asset")?), qty))
            })
            .filter(|(_, qty)| *qty > 0.0)
            .collect())
    }

    async fn fetch_tickers(&self) -> Result<PriceSnapshot, ExchangeError> {
        let body = self.spot.public_get("/api/v3/ticker/price", &[]).await?;
        Ok(array(&body, ID, "ticker list")?
            .iter()
            .filter_map(|t| {
                let (base, quote) = split_concatenated_symbol(&str_field(t, "symbol")?)?;
                Some((pair(&base, &quote), f64_field(t, "price")))
            })
            .collect())
    }

    async fn fetch_native_equity(&self) -> Result<f64, ExchangeError> {
        let body = self
            .spot
            .signed_get(
                "/sapi/v1/asset/wallet/balance",
                &[("quoteAsset", self.quote.clone())],
            )
            .await?;
        let wallets = array(&body, ID, "wallet balance")?;
        sum_wallet_balances(wallets)
            .ok_or_else(|| ExchangeError::malformed(ID, "no numeric wallet balances"))
    }

    async fn fetch_unified_balances(&self) -> Result<Vec<UnifiedAssetBalance>, ExchangeError> {
        let body = self.papi.signed_get("/papi/v1/balance", &[]).await?;
        Ok(array(&body, ID, "portfolio margin balance")?
            .iter()
            .filter_map(|b| {
                let asset = normalize_symbol(&str_field(b, "asset")?);
                Some(
                    UnifiedAssetBalance::new(asset, f64_field(b, "totalWalletBalance")?).with_pnl(
                        f64_or_zero(b, "umUnrealizedPNL"),
                        f64_or_zero(b, "cmUnrealizedPNL"),
                    ),
                )
            })
            .collect())
    }

    async fn fetch_withdrawals(&self, limit: usize) -> Result<Vec<Withdrawal>, ExchangeError> {
        let body = self
            .spot
            .signed_get(
                "/sapi/v1/capital/withdraw/history",
                &[("limit", limit.to_string())],
            )
            .await?;
        Ok(array(&body, ID, "withdraw history")?
            .iter()
            .filter_map(parse_withdrawal)
            .collect())
    }

    // Trade history on Binance is per-symbol only; fee collection stays
    // unsupported here.
}
