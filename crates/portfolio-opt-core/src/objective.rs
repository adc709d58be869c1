//! Portfolio return, volatility and Sharpe ratio as pure functions of a
//! weight vector.
//!
//! All functions are stateless and reentrant.

use serde::{Deserialize, Serialize};

use crate::error::PortfolioOptError;
use crate::returns_model::{CovarianceMatrix, LogReturns};
use crate::types::{Rate, TRADING_DAYS_PER_YEAR};
use crate::PortfolioOptResult;

/// Return, risk and Sharpe ratio of one weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    /// Annualized expected log-return.
    pub expected_return: f64,
    /// Annualized standard deviation.
    pub volatility: f64,
    /// (return - rf) / volatility.
    pub sharpe_ratio: f64,
}

/// Portfolio standard deviation: sqrt(w' * Sigma * w).
pub fn volatility(weights: &[f64], cov: &CovarianceMatrix) -> PortfolioOptResult<f64> {
    check_dimension("covariance_matrix", weights.len(), cov.dim())?;
    let variance = cov.quadratic_form(weights);
    let scale = cov
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| row[i])
        .fold(0.0_f64, f64::max);
    if variance < -1e-12 * scale.max(1.0) {
        return Err(PortfolioOptError::InvalidInput {
            field: "covariance_matrix".into(),
            reason: format!("Not positive semi-definite: w'Σw = {}", variance),
        });
    }
    Ok(variance.max(0.0).sqrt())
}

/// Annualized expected return using 252 trading days.
pub fn expected_return(weights: &[f64], log_returns: &LogReturns) -> PortfolioOptResult<f64> {
    annualized_expected_return(weights, log_returns, TRADING_DAYS_PER_YEAR)
}

/// `trading_days * Σ w_i * mean(R_i)`.
pub fn annualized_expected_return(
    weights: &[f64],
    log_returns: &LogReturns,
    trading_days: f64,
) -> PortfolioOptResult<f64> {
    check_dimension("log_returns", weights.len(), log_returns.n_assets())?;
    let daily: f64 = weights
        .iter()
        .zip(log_returns.mean_returns())
        .map(|(w, m)| w * m)
        .sum();
    Ok(daily * trading_days)
}

/// Sharpe ratio using 252 trading days.
pub fn sharpe_ratio(
    weights: &[f64],
    log_returns: &LogReturns,
    cov: &CovarianceMatrix,
    risk_free_rate: Rate,
) -> PortfolioOptResult<f64> {
    annualized_sharpe_ratio(weights, log_returns, cov, risk_free_rate, TRADING_DAYS_PER_YEAR)
}

/// (expected return - rf) / volatility. Zero volatility is an error, not a
/// NaN or an infinity.
pub fn annualized_sharpe_ratio(
    weights: &[f64],
    log_returns: &LogReturns,
    cov: &CovarianceMatrix,
    risk_free_rate: Rate,
    trading_days: f64,
) -> PortfolioOptResult<f64> {
    let ret = annualized_expected_return(weights, log_returns, trading_days)?;
    let vol = volatility(weights, cov)?;
    compute_sharpe(ret, risk_free_rate, vol)
}

/// All three metrics at once.
pub fn calculate_metrics(
    weights: &[f64],
    log_returns: &LogReturns,
    cov: &CovarianceMatrix,
    risk_free_rate: Rate,
    trading_days: f64,
) -> PortfolioOptResult<PortfolioMetrics> {
    let expected_return = annualized_expected_return(weights, log_returns, trading_days)?;
    let volatility = volatility(weights, cov)?;
    let sharpe_ratio = compute_sharpe(expected_return, risk_free_rate, volatility)?;
    Ok(PortfolioMetrics {
        expected_return,
        volatility,
        sharpe_ratio,
    })
}

fn compute_sharpe(ret: f64, rf: Rate, vol: f64) -> PortfolioOptResult<f64> {
    if vol == 0.0 {
        return Err(PortfolioOptError::DivisionByZero {
            context: "sharpe_ratio: portfolio volatility is zero".into(),
        });
    }
    Ok((ret - rf) / vol)
}

fn check_dimension(field: &str, weights: usize, expected: usize) -> PortfolioOptResult<()> {
    if weights != expected {
        return Err(PortfolioOptError::InvalidInput {
            field: field.into(),
            reason: format!("Expected {} weights but got {}", expected, weights),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
