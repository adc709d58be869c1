use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use portfolio_opt_core::allocation::{allocate, derive_allocation, AllocationInput};
use portfolio_opt_core::config::OptimizerConfig;
use portfolio_opt_core::returns_model::PriceHistory;
use portfolio_opt_core::PortfolioOptError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Allocation derived from weights and the forward-filled latest prices
// ===========================================================================

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn gappy_history() -> PriceHistory {
    let d = |day| NaiveDate::from_ymd_opt(2024, 4, day).unwrap();
    PriceHistory::new(
        names(&["AAA", "BBB", "CCC"]),
        vec![d(1), d(2), d(3)],
        vec![
            vec![Some(48.0), Some(19.0), None],
            vec![Some(49.0), Some(20.0), None],
            vec![Some(50.0), None, None],
        ],
    )
    .unwrap()
}

#[test]
fn test_latest_prices_forward_filled() {
    assert_eq!(gappy_history().latest_prices(), vec![Some(50.0), Some(20.0), None]);
}

#[test]
fn test_allocation_uses_forward_filled_price() {
    let history = gappy_history();
    let prices = history.latest_prices();
    let res = derive_allocation(
        &names(&["AAA", "BBB"]),
        &[0.7, 0.3],
        dec!(1000),
        &prices[..2],
        &OptimizerConfig::default(),
    )
    .unwrap();
    let shares: Vec<Decimal> = res.allocations.iter().map(|a| a.shares.round_dp(6)).collect();
    assert_eq!(shares, vec![dec!(14), dec!(15)]);
    assert_eq!(res.remaining_cash.round_dp(6), Decimal::ZERO);
}

#[test]
fn test_never_traded_asset_is_missing_price() {
    let history = gappy_history();
    let err = derive_allocation(
        history.tickers(),
        &[0.4, 0.3, 0.3],
        dec!(1000),
        &history.latest_prices(),
        &OptimizerConfig::default(),
    )
    .unwrap_err();
    match err {
        PortfolioOptError::MissingPrice { asset } => assert_eq!(asset, "CCC"),
        other => panic!("expected MissingPrice, got {:?}", other),
    }
}

#[test]
fn test_conservation_over_many_amounts() {
    let weights = [0.31, 0.007, 0.443, 0.24];
    let prices = [Some(12.34), Some(99.9), Some(0.75), Some(250.0)];
    for amount in [dec!(1), dec!(999.99), dec!(1000), dec!(31337.01), dec!(2500000)] {
        let res = derive_allocation(
            &names(&["A", "B", "C", "D"]),
            &weights,
            amount,
            &prices,
            &OptimizerConfig::default(),
        )
        .unwrap();
        let total: Decimal = res.allocations.iter().map(|a| a.cash).sum();
        assert_eq!(total + res.remaining_cash, amount);
        assert_eq!(res.allocations[1].cash, Decimal::ZERO);
    }
}

#[test]
fn test_allocate_from_json() {
    let input: AllocationInput = serde_json::from_value(serde_json::json!({
        "tickers": ["X", "Y"],
        "weights": [0.5, 0.5],
        "investment_amount": "2000",
        "latest_prices": [100.0, 40.0]
    }))
    .unwrap();
    let out = allocate(&input).unwrap();
    assert_eq!(out.result.allocations[0].cash.round_dp(6), dec!(1000));
    assert_eq!(out.result.allocations[1].shares.round_dp(6), dec!(25));
    assert!(out.warnings.is_empty());
}
