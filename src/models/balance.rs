use std::collections::{BTreeMap, HashMap};

/// Holdings of one account: asset symbol → quantity.
///
/// Snapshots built from a generic balance call only ever hold strictly
/// positive quantities. Unified-margin equity maps may carry negative
/// entries for assets that are net borrowed.
pub type AssetSnapshot = BTreeMap<String, f64>;

/// Last traded price keyed by unified pair (`BASE/QUOTE`).
///
/// `None` means the venue listed the pair but reported no usable price.
pub type PriceSnapshot = HashMap<String, Option<f64>>;

/// Upper-cased, trimmed asset symbol.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Unified pair key for a base/quote combination.
pub fn pair(base: &str, quote: &str) -> String {
    format!("{}/{}", normalize_symbol(base), normalize_symbol(quote))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_normalizes_both_legs() {
        assert_eq!(pair(" btc", "usdt "), "BTC/USDT");
    }
}
