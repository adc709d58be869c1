//! Seams for the data the optimizer consumes but never fetches itself.
//!
//! A market-data adapter implements [`PriceHistoryProvider`]; a benchmark
//! yield adapter implements [`RiskFreeRateProvider`]. The in-memory
//! implementations here back the CLI (built from CSV files) and the tests.

pub mod rates;
pub mod static_history;

use chrono::NaiveDate;

pub use rates::{FixedRiskFreeRate, RateObservation, RateSeries};
pub use static_history::StaticPriceHistory;

use crate::returns_model::PriceHistory;
use crate::types::Rate;
use crate::PortfolioOptResult;

/// Adjusted closing prices for `tickers` over `[start, end]`, columns in the
/// order requested. Gaps are allowed.
pub trait PriceHistoryProvider {
    fn fetch(&self, tickers: &[String], start: NaiveDate, end: NaiveDate) -> PortfolioOptResult<PriceHistory>;
}

/// Latest benchmark yield as a decimal fraction (0.045 for 4.5%).
pub trait RiskFreeRateProvider {
    fn latest_rate(&self) -> PortfolioOptResult<Rate>;
}
