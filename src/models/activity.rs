use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A withdrawal as reported by a venue, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub time: DateTime<Utc>,
    pub currency: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    /// The venue's record as received.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub raw: serde_json::Value,
}

/// A fee-bearing trade execution, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub time: DateTime<Utc>,
    pub symbol: String,
    pub side: String,
    /// Always non-negative; venues that report fees as negative deltas are flipped.
    pub fee_amount: f64,
    pub fee_currency: String,
    pub trade_id: String,
    pub price: f64,
    pub size: f64,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub raw: serde_json::Value,
}
