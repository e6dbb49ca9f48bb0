use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{EquityResult, Fee, Withdrawal};

/// One credential set: `(client, exchange, account label)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountIdentity {
    pub client: String,
    pub exchange: String,
    pub account: String,
}

impl AccountIdentity {
    pub fn new(
        client: impl Into<String>,
        exchange: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            client: client.into(),
            exchange: exchange.into(),
            account: account.into(),
        }
    }
}

impl fmt::Display for AccountIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.client, self.exchange, self.account)
    }
}

/// Everything learned about one account in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountReport {
    pub equity: EquityResult,
    pub withdrawals: Vec<Withdrawal>,
    pub fees: Vec<Fee>,
    /// Sum of fees paid in the quote currency. Other fee currencies are not converted.
    pub fee_total_quote: f64,
}

impl AccountReport {
    pub fn new(equity: EquityResult, withdrawals: Vec<Withdrawal>, fees: Vec<Fee>, quote: &str) -> Self {
        let fee_total_quote = fee_total(&fees, quote);
        Self {
            equity,
            withdrawals,
            fees,
            fee_total_quote,
        }
    }
}

fn fee_total(fees: &[Fee], quote: &str) -> f64 {
    fees.iter()
        .filter(|fee| fee.fee_currency.eq_ignore_ascii_case(quote))
        .map(|fee| fee.fee_amount)
        .sum()
}

/// All account reports for one client: exchange id → account label → report,
/// in the order the accounts were collected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientReport {
    pub client: String,
    pub exchanges: IndexMap<String, IndexMap<String, AccountReport>>,
}

impl ClientReport {
    pub fn empty(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            exchanges: IndexMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.values().all(IndexMap::is_empty)
    }

    pub fn account_count(&self) -> usize {
        self.exchanges.values().map(IndexMap::len).sum()
    }

    pub fn get(&self, exchange: &str, account: &str) -> Option<&AccountReport> {
        self.exchanges.get(exchange)?.get(account)
    }

    /// Accounts in encounter order: exchange, then account label.
    pub fn accounts(&self) -> impl Iterator<Item = (AccountIdentity, &AccountReport)> + '_ {
        self.exchanges.iter().flat_map(move |(exchange, accounts)| {
            accounts.iter().map(move |(account, report)| {
                (
                    AccountIdentity::new(self.client.clone(), exchange.clone(), account.clone()),
                    report,
                )
            })
        })
    }
}

impl FromIterator<(AccountIdentity, AccountReport)> for ClientReport {
    /// Collects reports of a single client. The client name is taken from the
    /// first identity.
    fn from_iter<I: IntoIterator<Item = (AccountIdentity, AccountReport)>>(iter: I) -> Self {
        let mut client = String::new();
        let mut exchanges: IndexMap<String, IndexMap<String, AccountReport>> = IndexMap::new();
        for (identity, report) in iter {
            if client.is_empty() {
                client = identity.client;
            }
            exchanges
                .entry(identity.exchange)
                .or_default()
                .insert(identity.account, report);
        }
        Self { client, exchanges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fee(amount: f64, currency: &str) -> Fee {
        Fee {
            time: Utc::now(),
            symbol: "BTC/USDT".to_string(),
            side: "buy".to_string(),
            fee_amount: amount,
            fee_currency: currency.to_string(),
            trade_id: "t".to_string(),
            price: 1.0,
            size: 1.0,
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn fee_total_only_counts_quote_currency() {
        let report = AccountReport::new(
            EquityResult::failed("x"),
            Vec::new(),
            vec![fee(1.5, "USDT"), fee(0.001, "BNB"), fee(0.5, "usdt")],
            "USDT",
        );
        assert_eq!(report.fee_total_quote, 2.0);
        assert_eq!(report.fees.len(), 3);
    }

    #[test]
    fn collects_reports_into_tree() {
        let ok = AccountReport::new(EquityResult::failed("a"), Vec::new(), Vec::new(), "USDT");
        let report: ClientReport = vec![
            (AccountIdentity::new("c", "okx", "main"), ok.clone()),
            (AccountIdentity::new("c", "okx", "sub_10"), ok.clone()),
            (AccountIdentity::new("c", "binance", "main"), ok.clone()),
            (AccountIdentity::new("c", "okx", "sub_2"), ok),
        ]
        .into_iter()
        .collect();

        assert_eq!(report.client, "c");
        assert_eq!(report.account_count(), 4);
        let order: Vec<String> = report.accounts().map(|(id, _)| id.to_string()).collect();
        assert_eq!(order, vec!["c/okx/main", "c/okx/sub_10", "c/okx/sub_2", "c/binance/main"]);
    }
}
