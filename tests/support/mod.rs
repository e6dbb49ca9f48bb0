#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use equisync::exchange::{
    ExchangeClient, ExchangeError, ExchangeRegistry, UnifiedAssetBalance, VenueOptions,
};
use equisync::models::{AssetSnapshot, Fee, PriceSnapshot, Withdrawal};

/// What a mocked capability answers.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Unsupported,
    Fail(String),
    Ok(T),
}

#[derive(Debug, Clone, Default)]
pub struct Calls {
    pub native: Arc<AtomicUsize>,
    pub unified: Arc<AtomicUsize>,
    pub balance: Arc<AtomicUsize>,
    pub tickers: Arc<AtomicUsize>,
    pub withdrawals: Arc<AtomicUsize>,
    pub trades: Arc<AtomicUsize>,
}

pub fn count(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

#[derive(Debug, Clone)]
pub struct MockVenue {
    pub id: String,
    pub native: Reply<f64>,
    pub unified: Reply<Vec<UnifiedAssetBalance>>,
    pub balance: Reply<AssetSnapshot>,
    pub tickers: Reply<PriceSnapshot>,
    pub withdrawals: Reply<Vec<Withdrawal>>,
    pub trades: Reply<Vec<Fee>>,
    pub calls: Calls,
}

impl Default for MockVenue {
    fn default() -> Self {
        Self {
            id: "mock".to_string(),
            native: Reply::Unsupported,
            unified: Reply::Unsupported,
            balance: Reply::Ok(AssetSnapshot::new()),
            tickers: Reply::Ok(PriceSnapshot::new()),
            withdrawals: Reply::Unsupported,
            trades: Reply::Unsupported,
            calls: Calls::default(),
        }
    }
}

impl MockVenue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_native(mut self, reply: Reply<f64>) -> Self {
        self.native = reply;
        self
    }

    pub fn with_unified(mut self, reply: Reply<Vec<UnifiedAssetBalance>>) -> Self {
        self.unified = reply;
        self
    }

    pub fn with_balance(mut self, reply: Reply<AssetSnapshot>) -> Self {
        self.balance = reply;
        self
    }

    pub fn with_tickers(mut self, reply: Reply<PriceSnapshot>) -> Self {
        self.tickers = reply;
        self
    }

    pub fn with_withdrawals(mut self, reply: Reply<Vec<Withdrawal>>) -> Self {
        self.withdrawals = reply;
        self
    }

    pub fn with_trades(mut self, reply: Reply<Vec<Fee>>) -> Self {
        self.trades = reply;
        self
    }

    fn answer<T: Clone>(
        &self,
        reply: &Reply<T>,
        counter: &AtomicUsize,
        capability: &'static str,
    ) -> Result<T, ExchangeError> {
        counter.fetch_add(1, Ordering::SeqCst);
        match reply {
            Reply::Unsupported => Err(ExchangeError::unsupported(&self.id, capability)),
            Reply::Fail(message) => Err(ExchangeError::Api {
                exchange: self.id.clone(),
                code: "-1".to_string(),
                message: message.clone(),
            }),
            Reply::Ok(value) => Ok(value.clone()),
        }
    }
}

#[async_trait]
impl ExchangeClient for MockVenue {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_balance(&self) -> Result<AssetSnapshot, ExchangeError> {
        self.answer(&self.balance, &self.calls.balance, "balance")
    }

    async fn fetch_tickers(&self) -> Result<PriceSnapshot, ExchangeError> {
        self.answer(&self.tickers, &self.calls.tickers, "tickers")
    }

    async fn fetch_native_equity(&self) -> Result<f64, ExchangeError> {
        self.answer(&self.native, &self.calls.native, "native equity")
    }

    async fn fetch_unified_balances(&self) -> Result<Vec<UnifiedAssetBalance>, ExchangeError> {
        self.answer(&self.unified, &self.calls.unified, "unified margin")
    }

    async fn fetch_withdrawals(&self, _limit: usize) -> Result<Vec<Withdrawal>, ExchangeError> {
        self.answer(&self.withdrawals, &self.calls.withdrawals, "withdrawal history")
    }

    async fn fetch_trades(
        &self,
        _since: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<Fee>, ExchangeError> {
        self.answer(&self.trades, &self.calls.trades, "trade history")
    }
}

/// A registry serving each venue under its own id.
pub fn registry_with(venues: Vec<MockVenue>, options: VenueOptions) -> ExchangeRegistry {
    let mut registry = ExchangeRegistry::empty(options);
    for venue in venues {
        let id = venue.id.clone();
        registry.register(&id, move |_, _| Ok(Box::new(venue.clone())));
    }
    registry
}

pub fn assets(items: &[(&str, f64)]) -> AssetSnapshot {
    items.iter().map(|(a, q)| (a.to_string(), *q)).collect()
}

pub fn prices(items: &[(&str, f64)]) -> PriceSnapshot {
    items.iter().map(|(p, v)| (p.to_string(), Some(*v))).collect()
}

pub fn fee(time: DateTime<Utc>, amount: f64, currency: &str) -> Fee {
    Fee {
        time,
        symbol: "BTC/USDT".to_string(),
        side: "buy".to_string(),
        fee_amount: amount,
        fee_currency: currency.to_string(),
        trade_id: time.timestamp_millis().to_string(),
        price: 50_000.0,
        size: 0.01,
        raw: serde_json::Value::Null,
    }
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, content)?;
    Ok(path)
}
