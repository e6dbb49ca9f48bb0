//! Turning exchange responses into a single equity figure in the quote
//! currency.

mod equity;
mod price;

pub use equity::{EquityResolver, EquityStrategy};
pub use price::PriceResolver;
