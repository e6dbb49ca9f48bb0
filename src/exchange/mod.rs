//! Exchange-client capability and the venue connectors behind it.
//!
//! The valuation core only talks to [`ExchangeClient`]. Each venue implements
//! the capabilities it actually has; the trait's default methods answer
//! [`ExchangeError::Unsupported`], which callers treat as a normal condition
//! rather than a failure.

pub mod binance;
pub mod bybit;
pub mod gate;
pub mod okx;
mod parse;
mod registry;
mod rest;

pub use registry::{ExchangeRegistry, VenueConstructor, VenueOptions};
pub use rest::{RestClient, Signer};

use chrono::{DateTime, Utc};

use crate::models::{AssetSnapshot, Fee, PriceSnapshot, Withdrawal};

/// Errors from exchange calls.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("{exchange} does not support {capability}")]
    Unsupported {
        exchange: String,
        capability: &'static str,
    },

    #[error("unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("{0}")]
    Credentials(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{exchange} HTTP {status}: {body}")]
    Http {
        exchange: String,
        status: u16,
        body: String,
    },

    #[error("{exchange} API error {code}: {message}")]
    Api {
        exchange: String,
        code: String,
        message: String,
    },

    #[error("unexpected {exchange} response: {detail}")]
    Malformed { exchange: String, detail: String },
}

impl ExchangeError {
    pub fn unsupported(exchange: &str, capability: &'static str) -> Self {
        ExchangeError::Unsupported {
            exchange: exchange.to_string(),
            capability,
        }
    }

    pub fn malformed(exchange: &str, detail: impl Into<String>) -> Self {
        ExchangeError::Malformed {
            exchange: exchange.to_string(),
            detail: detail.into(),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, ExchangeError::Unsupported { .. })
    }
}

/// One asset line of a unified / portfolio margin account.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedAssetBalance {
    pub asset: String,
    pub wallet_balance: f64,
    /// Unrealized PnL of USD-margined derivatives.
    pub um_unrealized_pnl: f64,
    /// Unrealized PnL of coin-margined derivatives.
    pub cm_unrealized_pnl: f64,
}

impl UnifiedAssetBalance {
    pub fn new(asset: impl Into<String>, wallet_balance: f64) -> Self {
        Self {
            asset: asset.into(),
            wallet_balance,
            um_unrealized_pnl: 0.0,
            cm_unrealized_pnl: 0.0,
        }
    }

    pub fn with_pnl(mut self, um: f64, cm: f64) -> Self {
        self.um_unrealized_pnl = um;
        self.cm_unrealized_pnl = cm;
        self
    }

    pub fn equity(&self) -> f64 {
        self.wallet_balance + self.um_unrealized_pnl + self.cm_unrealized_pnl
    }
}

/// What the core needs from an exchange account.
#[async_trait::async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Lower-case exchange id (`okx`, `binance`, ...).
    fn id(&self) -> &str;

    /// Total quantity per asset from the generic balance endpoint.
    async fn fetch_balance(&self) -> Result<AssetSnapshot, ExchangeError>;

    /// Bulk last prices keyed by unified pair (`BASE/QUOTE`).
    async fn fetch_tickers(&self) -> Result<PriceSnapshot, ExchangeError>;

    /// Venue-computed total equity, already in the quote currency.
    async fn fetch_native_equity(&self) -> Result<f64, ExchangeError> {
        Err(ExchangeError::unsupported(self.id(), "native equity"))
    }

    /// Per-asset balances of a unified / portfolio margin account.
    async fn fetch_unified_balances(&self) -> Result<Vec<UnifiedAssetBalance>, ExchangeError> {
        Err(ExchangeError::unsupported(self.id(), "unified margin balances"))
    }

    /// Most recent withdrawals, newest first, at most `limit`.
    async fn fetch_withdrawals(&self, _limit: usize) -> Result<Vec<Withdrawal>, ExchangeError> {
        Err(ExchangeError::unsupported(self.id(), "withdrawal history"))
    }

    /// Fee-bearing executions since `since`, at most `limit`.
    async fn fetch_trades(
        &self,
        _since: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<Fee>, ExchangeError> {
        Err(ExchangeError::unsupported(self.id(), "trade history"))
    }
}

/// Split a concatenated venue symbol (`BTCUSDT`) into a unified pair using
/// the known quote suffixes, longest first.
pub fn split_concatenated_symbol(symbol: &str) -> Option<(String, String)> {
    const QUOTES: [&str; 10] = [
        "FDUSD", "USDT", "USDC", "BUSD", "TUSD", "EUR", "TRY", "BTC", "ETH", "BNB",
    ];
    let symbol = symbol.trim().to_uppercase();
    QUOTES.iter().find_map(|quote| {
        symbol
            .strip_suffix(quote)
            .filter(|base| !base.is_empty())
            .map(|base| (base.to_string(), quote.to_string()))
    })
}
