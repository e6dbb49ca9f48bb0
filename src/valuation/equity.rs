use std::fmt;

use crate::exchange::{ExchangeClient, ExchangeError, UnifiedAssetBalance};
use crate::models::{AssetSnapshot, EquityResult, ValuationBasis};

use super::PriceResolver;

/// Ways of arriving at an account's equity, tried in [`EquityStrategy::ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquityStrategy {
    /// The venue's own aggregate valuation endpoint.
    Native,
    /// Unified/portfolio margin balances including unrealized PnL.
    UnifiedMargin,
    /// Generic balances priced through the ticker snapshot.
    SpotBalance,
}

impl EquityStrategy {
    pub const ORDER: [EquityStrategy; 3] = [
        EquityStrategy::Native,
        EquityStrategy::UnifiedMargin,
        EquityStrategy::SpotBalance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EquityStrategy::Native => "native",
            EquityStrategy::UnifiedMargin => "unified_margin",
            EquityStrategy::SpotBalance => "spot_balance",
        }
    }
}

impl fmt::Display for EquityStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves one equity figure per account from the first strategy that works.
#[derive(Debug, Clone)]
pub struct EquityResolver {
    prices: PriceResolver,
}

impl EquityResolver {
    pub fn new(prices: PriceResolver) -> Self {
        Self { prices }
    }

    pub fn price_resolver(&self) -> &PriceResolver {
        &self.prices
    }

    /// Walk the strategies in order. Strategies the venue does not offer are
    /// skipped; a failing one is logged and the next one runs. When every
    /// attempted strategy fails, the last error is reported.
    pub async fn resolve(&self, client: &dyn ExchangeClient) -> EquityResult {
        let mut last_error: Option<ExchangeError> = None;

        for strategy in EquityStrategy::ORDER {
            match self.attempt(strategy, client).await {
                Ok(result) => {
                    tracing::debug!(
                        exchange = client.id(),
                        strategy = %strategy,
                        total = ?result.total(),
                        "equity resolved"
                    );
                    return result;
                }
                Err(e) if e.is_unsupported() => {
                    tracing::debug!(exchange = client.id(), strategy = %strategy, "strategy not offered");
                }
                Err(e) => {
                    tracing::warn!(
                        exchange = client.id(),
                        strategy = %strategy,
                        error = %e,
                        "equity strategy failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => EquityResult::failed(e.to_string()),
            None => EquityResult::failed(format!("no equity strategy available for {}", client.id())),
        }
    }

    async fn attempt(
        &self,
        strategy: EquityStrategy,
        client: &dyn ExchangeClient,
    ) -> Result<EquityResult, ExchangeError> {
        match strategy {
            EquityStrategy::Native => {
                let total = client.fetch_native_equity().await?;
                Ok(EquityResult::valued(total, ValuationBasis::Native))
            }
            EquityStrategy::UnifiedMargin => {
                let balances = client.fetch_unified_balances().await?;
                let assets = unified_equity(&balances);
                Ok(self.price(client, &assets, ValuationBasis::UnifiedMargin).await)
            }
            EquityStrategy::SpotBalance => {
                let assets: AssetSnapshot = client
                    .fetch_balance()
                    .await?
                    .into_iter()
                    .filter(|(_, qty)| *qty > 0.0)
                    .collect();
                Ok(self.price(client, &assets, ValuationBasis::SpotBalance).await)
            }
        }
    }

    async fn price(
        &self,
        client: &dyn ExchangeClient,
        assets: &AssetSnapshot,
        basis: ValuationBasis,
    ) -> EquityResult {
        if !self.prices.needs_prices(assets) {
            return EquityResult::valued(self.prices.quote_only(assets), basis);
        }
        self.prices.value(assets, client.fetch_tickers().await, basis)
    }
}

/// Per-asset equity of a unified account. Entries for the same asset are
/// merged; exact zeros are dropped, negative (borrowed) entries kept.
fn unified_equity(balances: &[UnifiedAssetBalance]) -> AssetSnapshot {
    let mut assets = AssetSnapshot::new();
    for balance in balances {
        *assets.entry(balance.asset.clone()).or_insert(0.0) += balance.equity();
    }
    assets.retain(|_, qty| *qty != 0.0);
    assets
}
