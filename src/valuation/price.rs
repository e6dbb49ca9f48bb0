use std::fmt::Display;

use crate::models::{pair, AssetSnapshot, EquityResult, PriceSnapshot, ValuationBasis};

/// Values an asset snapshot in the quote currency using a bulk price snapshot.
///
/// Each non-quote asset is looked up as `ASSET/QUOTE` first, then as
/// `ASSET/ALT` where the alternate stable quote is taken at parity with the
/// quote currency. Assets with neither price contribute nothing.
#[derive(Debug, Clone)]
pub struct PriceResolver {
    quote: String,
    alt_quote: Option<String>,
}

impl PriceResolver {
    pub fn new(quote: impl Into<String>) -> Self {
        Self {
            quote: quote.into().to_uppercase(),
            alt_quote: None,
        }
    }

    pub fn with_alt_quote(mut self, alt_quote: impl Into<String>) -> Self {
        let alt_quote = alt_quote.into().to_uppercase();
        self.alt_quote = (alt_quote != self.quote).then_some(alt_quote);
        self
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    pub fn alt_quote(&self) -> Option<&str> {
        self.alt_quote.as_deref()
    }

    /// Whether valuing `assets` needs a price snapshot at all.
    pub fn needs_prices(&self, assets: &AssetSnapshot) -> bool {
        assets.keys().any(|asset| asset != &self.quote)
    }

    /// Price of one unit of `asset` in the quote currency, if known.
    pub fn price_of(&self, asset: &str, prices: &PriceSnapshot) -> Option<f64> {
        if asset == self.quote {
            return Some(1.0);
        }
        if let Some(price) = lookup(prices, asset, &self.quote) {
            return Some(price);
        }
        let alt = self.alt_quote.as_deref()?;
        if asset == alt {
            // The alternate stable coin itself: its own pair when listed, parity otherwise.
            return Some(lookup(prices, alt, &self.quote).unwrap_or(1.0));
        }
        lookup(prices, asset, alt)
    }

    pub fn resolve(&self, assets: &AssetSnapshot, prices: &PriceSnapshot) -> f64 {
        assets
            .iter()
            .map(|(asset, qty)| match self.price_of(asset, prices) {
                Some(price) => qty * price,
                None => {
                    tracing::debug!(asset = %asset, quote = %self.quote, "no price; valued at 0");
                    0.0
                }
            })
            .sum()
    }

    /// Quote-currency holdings only.
    pub fn quote_only(&self, assets: &AssetSnapshot) -> f64 {
        assets.get(&self.quote).copied().unwrap_or(0.0)
    }

    /// Value `assets` from the outcome of a price fetch. A failed fetch
    /// degrades to [`ValuationBasis::QuoteOnly`] instead of failing.
    pub fn value<E: Display>(
        &self,
        assets: &AssetSnapshot,
        prices: Result<PriceSnapshot, E>,
        basis: ValuationBasis,
    ) -> EquityResult {
        match prices {
            Ok(prices) => EquityResult::valued(self.resolve(assets, &prices), basis),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    quote = %self.quote,
                    "price snapshot unavailable; counting quote holdings only"
                );
                EquityResult::valued(self.quote_only(assets), ValuationBasis::QuoteOnly)
            }
        }
    }
}

fn lookup(prices: &PriceSnapshot, base: &str, quote: &str) -> Option<f64> {
    prices
        .get(&pair(base, quote))
        .copied()
        .flatten()
        .filter(|p| p.is_finite() && *p > 0.0)
}
