use serde::{Deserialize, Serialize};

/// How a successful equity figure was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationBasis {
    /// Venue-computed total from a proprietary aggregate endpoint.
    Native,
    /// Wallet balance plus unrealized PnL from a unified/portfolio margin account.
    UnifiedMargin,
    /// Generic balances priced through the ticker snapshot.
    SpotBalance,
    /// The ticker snapshot was unavailable; only quote-currency holdings counted.
    QuoteOnly,
}

impl ValuationBasis {
    /// Partial success: the figure ignores every non-quote asset.
    pub fn is_degraded(self) -> bool {
        matches!(self, ValuationBasis::QuoteOnly)
    }
}

/// Outcome of equity resolution for one account. Exactly one of the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EquityResult {
    Valued { total: f64, basis: ValuationBasis },
    Failed { error: String },
}

impl EquityResult {
    pub fn valued(total: f64, basis: ValuationBasis) -> Self {
        EquityResult::Valued { total, basis }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        EquityResult::Failed {
            error: error.into(),
        }
    }

    pub fn total(&self) -> Option<f64> {
        match self {
            EquityResult::Valued { total, .. } => Some(*total),
            EquityResult::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            EquityResult::Valued { .. } => None,
            EquityResult::Failed { error } => Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, EquityResult::Valued { .. })
    }
}
