mod account;
mod activity;
mod balance;
mod equity;

pub use account::{AccountIdentity, AccountReport, ClientReport};
pub use activity::{Fee, Withdrawal};
pub use balance::{normalize_symbol, pair, AssetSnapshot, PriceSnapshot};
pub use equity::{EquityResult, ValuationBasis};
