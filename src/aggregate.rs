//! Per-client fan-out over every configured exchange account.

use crate::activity::ActivityCollector;
use crate::credentials::{ClientConfig, Credential};
use crate::exchange::ExchangeRegistry;
use crate::models::{AccountIdentity, AccountReport, ClientReport, EquityResult};
use crate::valuation::EquityResolver;

/// Builds a [`ClientReport`] for one client.
///
/// Every configured account gets exactly one report, whatever happens to the
/// others: failures are recorded on the account, never propagated.
pub struct AccountAggregator {
    registry: ExchangeRegistry,
    equity: EquityResolver,
    activity: ActivityCollector,
}

impl AccountAggregator {
    pub fn new(registry: ExchangeRegistry, equity: EquityResolver) -> Self {
        Self {
            registry,
            equity,
            activity: ActivityCollector::new(),
        }
    }

    pub fn quote(&self) -> &str {
        self.equity.price_resolver().quote()
    }

    pub async fn aggregate(&self, client: &ClientConfig) -> ClientReport {
        if client.account_count() == 0 {
            tracing::warn!(client = %client.name, "client has no configured exchange accounts");
            return ClientReport::empty(&client.name);
        }

        let mut reports = Vec::with_capacity(client.account_count());
        for (exchange, accounts) in &client.exchanges {
            for (label, credential) in accounts {
                let identity = AccountIdentity::new(&client.name, exchange, label);
                let report = self.account_report(&identity, credential).await;
                reports.push((identity, report));
            }
        }

        let mut report: ClientReport = reports.into_iter().collect();
        report.client = client.name.clone();
        report
    }

    async fn account_report(&self, identity: &AccountIdentity, credential: &Credential) -> AccountReport {
        tracing::info!(account = %identity, "fetching account");

        let client = match self.registry.create(&identity.exchange, credential) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(account = %identity, error = %e, "could not build exchange client");
                return AccountReport::new(EquityResult::failed(e.to_string()), Vec::new(), Vec::new(), self.quote());
            }
        };

        let equity = self.equity.resolve(client.as_ref()).await;
        if let Some(error) = equity.error() {
            tracing::warn!(account = %identity, error, "equity unavailable");
        }

        let now = self.registry.options().clock.now();
        let activity = self.activity.collect(client.as_ref(), now).await;

        AccountReport::new(equity, activity.withdrawals, activity.fees, self.quote())
    }
}
