use chrono::{DateTime, Utc};

use crate::format::format_quote_value;
use crate::models::{ClientReport, EquityResult};

use super::{Column, TableRow, TIMESTAMP_FORMAT};

pub const METRIC_EQUITY: &str = "equity";
pub const METRIC_FEE_TOTAL: &str = "fee_total";
/// Currency cell of rows that carry an error message instead of a value.
pub const ERROR_CURRENCY: &str = "error";

/// Flattens client reports into table rows.
#[derive(Debug, Clone)]
pub struct RowProjector {
    quote: String,
}

impl RowProjector {
    pub fn new(quote: impl Into<String>) -> Self {
        Self {
            quote: quote.into().to_uppercase(),
        }
    }

    /// Rows ordered exchange → account → metric. A failed account yields a
    /// single error row; a valued one yields its equity row plus a fee total
    /// row when fees were collected.
    pub fn project(&self, report: &ClientReport, timestamp: DateTime<Utc>) -> Vec<TableRow> {
        let updated_at = timestamp.format(TIMESTAMP_FORMAT).to_string();
        let mut rows = Vec::new();

        for (identity, account) in report.accounts() {
            let base = TableRow::new()
                .with(Column::Client, identity.client.as_str())
                .with(Column::Exchange, identity.exchange.to_uppercase())
                .with(Column::Account, identity.account.as_str());

            match &account.equity {
                EquityResult::Failed { error } => rows.push(
                    base.with(Column::Metric, METRIC_EQUITY)
                        .with(Column::Currency, ERROR_CURRENCY)
                        .with(Column::Value, error.as_str())
                        .with(Column::UpdatedAt, updated_at.as_str()),
                ),
                EquityResult::Valued { total, .. } => {
                    rows.push(
                        base.clone()
                            .with(Column::Metric, METRIC_EQUITY)
                            .with(Column::Currency, self.quote.as_str())
                            .with(Column::Value, format_quote_value(*total))
                            .with(Column::UpdatedAt, updated_at.as_str()),
                    );
                    if !account.fees.is_empty() {
                        rows.push(
                            base.with(Column::Metric, METRIC_FEE_TOTAL)
                                .with(Column::Currency, self.quote.as_str())
                                .with(Column::Value, format_quote_value(account.fee_total_quote))
                                .with(Column::UpdatedAt, updated_at.as_str()),
                        );
                    }
                }
            }
        }

        rows
    }
}
