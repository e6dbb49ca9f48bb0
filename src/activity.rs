//! Bounded withdrawal and trade-fee history per account.

use chrono::{DateTime, Duration, Utc};

use crate::exchange::{ExchangeClient, ExchangeError};
use crate::models::{Fee, Withdrawal};

pub const WITHDRAWAL_LIMIT: usize = 5;
pub const FEE_LIMIT: usize = 100;
pub const FEE_LOOKBACK_DAYS: i64 = 7;

/// Recent activity of one account, most recent first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activity {
    pub withdrawals: Vec<Withdrawal>,
    pub fees: Vec<Fee>,
}

#[derive(Debug, Clone)]
pub struct ActivityCollector {
    withdrawal_limit: usize,
    fee_limit: usize,
    lookback: Duration,
}

impl Default for ActivityCollector {
    fn default() -> Self {
        Self {
            withdrawal_limit: WITHDRAWAL_LIMIT,
            fee_limit: FEE_LIMIT,
            lookback: Duration::days(FEE_LOOKBACK_DAYS),
        }
    }
}

impl ActivityCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect withdrawals and fees. Neither list ever fails the account: an
    /// unsupported or failing source yields an empty list.
    pub async fn collect(&self, client: &dyn ExchangeClient, now: DateTime<Utc>) -> Activity {
        let withdrawals = client.fetch_withdrawals(self.withdrawal_limit).await;
        let mut withdrawals = or_empty(client.id(), "withdrawals", withdrawals);
        withdrawals.sort_by(|a, b| b.time.cmp(&a.time));
        withdrawals.truncate(self.withdrawal_limit);

        let since = now - self.lookback;
        let fees = client.fetch_trades(since, self.fee_limit).await;
        let mut fees: Vec<Fee> = or_empty(client.id(), "fees", fees)
            .into_iter()
            .filter(|fee| fee.time >= since)
            .collect();
        fees.sort_by(|a, b| b.time.cmp(&a.time));
        fees.truncate(self.fee_limit);

        Activity { withdrawals, fees }
    }
}

fn or_empty<T>(exchange: &str, what: &str, result: Result<Vec<T>, ExchangeError>) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) if e.is_unsupported() => {
            tracing::debug!(exchange, what, "not supported; leaving empty");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(exchange, what, error = %e, "activity fetch failed; leaving empty");
            Vec::new()
        }
    }
}
