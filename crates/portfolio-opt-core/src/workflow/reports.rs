use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PortfolioOptError;
use crate::objective::{calculate_metrics, PortfolioMetrics};
use crate::returns_model::{PriceHistory, ReturnsModel, ReturnsSummary};
use crate::types::{with_metadata, ComputationOutput, Rate, TRADING_DAYS_PER_YEAR};
use crate::PortfolioOptResult;

fn default_trading_days() -> f64 {
    TRADING_DAYS_PER_YEAR
}

/// Price table to summarize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnsReportInput {
    pub price_history: PriceHistory,
    #[serde(default = "default_trading_days")]
    pub trading_days: f64,
}

/// A fixed weight vector to evaluate against a price table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioMetricsInput {
    pub price_history: PriceHistory,
    /// Aligned with `price_history` tickers.
    pub weights: Vec<f64>,
    pub risk_free_rate: Rate,
    #[serde(default = "default_trading_days")]
    pub trading_days: f64,
}

/// Annualized mean return and volatility per asset plus the covariance matrix.
pub fn summarize_returns(input: &ReturnsReportInput) -> PortfolioOptResult<ComputationOutput<ReturnsSummary>> {
    let start = Instant::now();
    let summary = ReturnsModel::new(input.trading_days)?.summarize(&input.price_history)?;

    let mut warnings = Vec::new();
    if summary.dropped_rows > 0 {
        warnings.push(format!(
            "{} return row(s) dropped because at least one asset had a price gap",
            summary.dropped_rows
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Daily log-returns, sample covariance (n-1) annualized",
        &serde_json::json!({ "trading_days": input.trading_days }),
        warnings,
        elapsed,
        summary,
    ))
}

/// Expected return, volatility and Sharpe ratio of the given weights.
pub fn evaluate_portfolio(
    input: &PortfolioMetricsInput,
) -> PortfolioOptResult<ComputationOutput<PortfolioMetrics>> {
    let start = Instant::now();
    let estimate = ReturnsModel::new(input.trading_days)?.estimate(&input.price_history)?;

    let mut warnings = Vec::new();
    let sum: f64 = input.weights.iter().sum();
    if (sum - 1.0).abs() > 1e-6 {
        warnings.push(format!("Weights sum to {:.6}, not 1", sum));
    }
    if let Some((i, w)) = input.weights.iter().enumerate().find(|(_, w)| !w.is_finite()) {
        return Err(PortfolioOptError::InvalidInput {
            field: format!("weights[{}]", i),
            reason: format!("Weight must be finite, got {}", w),
        });
    }

    let metrics = calculate_metrics(
        &input.weights,
        &estimate.log_returns,
        &estimate.covariance,
        input.risk_free_rate,
        input.trading_days,
    )?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Annualized log-return mean, sqrt(w'Σw) volatility, Sharpe = (return - rf) / volatility",
        &serde_json::json!({
            "trading_days": input.trading_days,
            "risk_free_rate": input.risk_free_rate,
        }),
        warnings,
        elapsed,
        metrics,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn history() -> PriceHistory {
        let d = |day| NaiveDate::from_ymd_opt(2024, 7, day).unwrap();
        PriceHistory::new(
            vec!["A".into(), "B".into()],
            vec![d(1), d(2), d(3), d(5), d(8), d(9)],
            vec![
                vec![Some(10.0), Some(30.0)],
                vec![Some(10.2), Some(29.7)],
                vec![Some(10.1), None],
                vec![Some(10.4), Some(30.3)],
                vec![Some(10.3), Some(30.9)],
                vec![Some(10.6), Some(30.4)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_summary_reports_dropped_rows() {
        let out = summarize_returns(&ReturnsReportInput {
            price_history: history(),
            trading_days: 252.0,
        })
        .unwrap();
        assert_eq!(out.result.dropped_rows, 2);
        assert_eq!(out.result.return_periods, 3);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_metrics_weight_count_mismatch() {
        let input = PortfolioMetricsInput {
            price_history: history(),
            weights: vec![1.0],
            risk_free_rate: 0.0,
            trading_days: 252.0,
        };
        let err = evaluate_portfolio(&input).unwrap_err();
        assert!(matches!(err, PortfolioOptError::InvalidInput { .. }));
    }

    #[test]
    fn test_metrics_warn_on_unnormalized_weights() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 7, day).unwrap();
        let history = PriceHistory::new(
            vec!["A".into(), "B".into()],
            vec![d(1), d(2), d(3), d(4)],
            vec![
                vec![Some(10.0), Some(30.0)],
                vec![Some(10.2), Some(29.7)],
                vec![Some(10.1), Some(30.1)],
                vec![Some(10.4), Some(30.3)],
            ],
        )
        .unwrap();
        let out = evaluate_portfolio(&PortfolioMetricsInput {
            price_history: history,
            weights: vec![0.6, 0.3],
            risk_free_rate: 0.01,
            trading_days: 252.0,
        })
        .unwrap();
        assert_eq!(out.warnings.len(), 1);
        let m = out.result;
        assert_relative_eq!(m.sharpe_ratio, (m.expected_return - 0.01) / m.volatility, epsilon = 1e-12);
    }
}
