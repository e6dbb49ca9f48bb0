mod support;

use equisync::exchange::UnifiedAssetBalance;
use equisync::models::{EquityResult, ValuationBasis};
use equisync::valuation::{EquityResolver, PriceResolver};
use support::{assets, count, prices, MockVenue, Reply};

fn resolver() -> EquityResolver {
    EquityResolver::new(PriceResolver::new("USDT").with_alt_quote("USDC"))
}

#[tokio::test]
async fn native_success_skips_remaining_strategies() {
    let venue = MockVenue::new()
        .with_native(Reply::Ok(1000.0))
        .with_unified(Reply::Ok(vec![UnifiedAssetBalance::new("USDT", 5.0)]))
        .with_balance(Reply::Ok(assets(&[("BTC", 1.0)])));

    let result = resolver().resolve(&venue).await;

    assert_eq!(result, EquityResult::valued(1000.0, ValuationBasis::Native));
    assert_eq!(count(&venue.calls.native), 1);
    assert_eq!(count(&venue.calls.unified), 0);
    assert_eq!(count(&venue.calls.balance), 0);
    assert_eq!(count(&venue.calls.tickers), 0);
}

#[tokio::test]
async fn failing_native_falls_through_to_unified_margin() {
    let venue = MockVenue::new()
        .with_native(Reply::Fail("maintenance".to_string()))
        .with_unified(Reply::Ok(vec![
            UnifiedAssetBalance::new("USDT", 100.0).with_pnl(10.0, -2.0),
            UnifiedAssetBalance::new("BTC", 0.01),
        ]))
        .with_tickers(Reply::Ok(prices(&[("BTC/USDT", 50_000.0)])));

    let result = resolver().resolve(&venue).await;

    assert_eq!(result, EquityResult::valued(608.0, ValuationBasis::UnifiedMargin));
    assert_eq!(count(&venue.calls.balance), 0);
}

#[tokio::test]
async fn unified_quote_only_does_not_fetch_prices() {
    let venue = MockVenue::new().with_unified(Reply::Ok(vec![
        UnifiedAssetBalance::new("USDT", 250.0).with_pnl(0.5, 0.0),
    ]));

    let result = resolver().resolve(&venue).await;

    assert_eq!(result.total(), Some(250.5));
    assert_eq!(count(&venue.calls.tickers), 0);
}

#[tokio::test]
async fn spot_balance_prices_every_asset() {
    let venue = MockVenue::new()
        .with_balance(Reply::Ok(assets(&[("USDT", 100.0), ("ETH", 2.0), ("SOL", 3.0), ("PEPE", 1e9)])))
        .with_tickers(Reply::Ok(prices(&[("ETH/USDT", 2000.0), ("SOL/USDC", 150.0)])));

    let result = resolver().resolve(&venue).await;

    assert_eq!(result, EquityResult::valued(100.0 + 4000.0 + 450.0, ValuationBasis::SpotBalance));
    assert_eq!(count(&venue.calls.native), 1);
    assert_eq!(count(&venue.calls.unified), 1);
}

#[tokio::test]
async fn unreachable_price_snapshot_degrades_to_quote_only() {
    let venue = MockVenue::new()
        .with_balance(Reply::Ok(assets(&[("USDT", 42.0), ("BTC", 1.0)])))
        .with_tickers(Reply::Fail("timeout".to_string()));

    let result = resolver().resolve(&venue).await;

    assert_eq!(result, EquityResult::valued(42.0, ValuationBasis::QuoteOnly));
    assert!(matches!(
        result,
        EquityResult::Valued { basis, .. } if basis.is_degraded()
    ));
}

#[tokio::test]
async fn all_strategies_failing_reports_last_error() {
    let venue = MockVenue::new()
        .with_native(Reply::Fail("native down".to_string()))
        .with_unified(Reply::Fail("unified down".to_string()))
        .with_balance(Reply::Fail("balance down".to_string()));

    let result = resolver().resolve(&venue).await;

    assert_eq!(result.error(), Some("mock API error -1: balance down"));
    assert_eq!(count(&venue.calls.native), 1);
    assert_eq!(count(&venue.calls.unified), 1);
    assert_eq!(count(&venue.calls.balance), 1);
}

#[tokio::test]
async fn unsupported_strategies_do_not_mask_the_real_error() {
    let venue = MockVenue::new()
        .with_native(Reply::Fail("native down".to_string()))
        .with_balance(Reply::Unsupported);

    let result = resolver().resolve(&venue).await;

    assert_eq!(result.error(), Some("mock API error -1: native down"));
}

#[tokio::test]
async fn empty_balance_is_zero_not_an_error() {
    let venue = MockVenue::new();

    let result = resolver().resolve(&venue).await;

    assert_eq!(result, EquityResult::valued(0.0, ValuationBasis::SpotBalance));
    assert_eq!(count(&venue.calls.tickers), 0);
}
