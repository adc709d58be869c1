pub mod covariance;
pub mod log_returns;
pub mod price_history;

use serde::{Deserialize, Serialize};

pub use covariance::CovarianceMatrix;
pub use log_returns::LogReturns;
pub use price_history::{PriceHistory, PriceHistoryData};

use crate::error::PortfolioOptError;
use crate::PortfolioOptResult;

/// Return and risk estimates derived from one price table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnsEstimate {
    pub log_returns: LogReturns,
    pub covariance: CovarianceMatrix,
    /// Annualization factor applied to the covariance.
    pub trading_days: f64,
}

impl ReturnsEstimate {
    pub fn tickers(&self) -> &[String] {
        self.log_returns.tickers()
    }

    /// Mean daily log-return per asset scaled to a year.
    pub fn annual_mean_returns(&self) -> Vec<f64> {
        self.log_returns
            .mean_returns()
            .iter()
            .map(|m| m * self.trading_days)
            .collect()
    }
}

/// Summary of a returns estimate, one row per asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetReturnSummary {
    pub ticker: String,
    pub annual_mean_return: f64,
    pub annual_volatility: f64,
}

/// Output of [`ReturnsModel::summarize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnsSummary {
    pub assets: Vec<AssetReturnSummary>,
    pub covariance_matrix: Vec<Vec<f64>>,
    pub return_periods: usize,
    pub dropped_rows: usize,
}

/// Turns a price table into log-returns and an annualized covariance matrix.
#[derive(Debug, Clone, Copy)]
pub struct ReturnsModel {
    trading_days: f64,
}

impl Default for ReturnsModel {
    fn default() -> Self {
        Self {
            trading_days: crate::types::TRADING_DAYS_PER_YEAR,
        }
    }
}

impl ReturnsModel {
    pub fn new(trading_days: f64) -> PortfolioOptResult<Self> {
        if !(trading_days > 0.0) || !trading_days.is_finite() {
            return Err(PortfolioOptError::InvalidInput {
                field: "trading_days".into(),
                reason: format!("Annualization factor must be positive, got {}", trading_days),
            });
        }
        Ok(Self { trading_days })
    }

    pub fn trading_days(&self) -> f64 {
        self.trading_days
    }

    pub fn estimate(&self, history: &PriceHistory) -> PortfolioOptResult<ReturnsEstimate> {
        let log_returns = LogReturns::from_prices(history)?;
        let covariance = CovarianceMatrix::from_log_returns(&log_returns, self.trading_days)?;
        tracing::debug!(
            assets = log_returns.n_assets(),
            periods = log_returns.n_periods(),
            "estimated returns model"
        );
        Ok(ReturnsEstimate {
            log_returns,
            covariance,
            trading_days: self.trading_days,
        })
    }

    pub fn summarize(&self, history: &PriceHistory) -> PortfolioOptResult<ReturnsSummary> {
        let estimate = self.estimate(history)?;
        let vols = estimate.covariance.asset_volatilities();
        let assets = estimate
            .tickers()
            .iter()
            .zip(estimate.annual_mean_returns())
            .zip(vols)
            .map(|((ticker, ret), vol)| AssetReturnSummary {
                ticker: ticker.clone(),
                annual_mean_return: ret,
                annual_volatility: vol,
            })
            .collect();
        Ok(ReturnsSummary {
            assets,
            covariance_matrix: estimate.covariance.rows().to_vec(),
            return_periods: estimate.log_returns.n_periods(),
            dropped_rows: estimate.log_returns.dropped_rows(),
        })
    }
}
