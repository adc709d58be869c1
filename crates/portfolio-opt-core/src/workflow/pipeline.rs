use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::allocation::derive_allocation;
use crate::config::OptimizerConfig;
use crate::objective::{calculate_metrics, PortfolioMetrics};
use crate::optimizer::{optimize_max_sharpe, Termination};
use crate::returns_model::{PriceHistory, ReturnsModel};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::PortfolioOptResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything one optimization run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioOptimizationInput {
    pub price_history: PriceHistory,
    /// Annual risk-free rate as a decimal fraction.
    pub risk_free_rate: Rate,
    /// Cash to split across the assets. Allocation is skipped when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investment_amount: Option<Money>,
    #[serde(default)]
    pub config: OptimizerConfig,
}

/// One row of the final portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetPosition {
    pub ticker: String,
    pub weight: f64,
    pub weight_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares: Option<Decimal>,
}

/// How the solve went.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverDiagnostics {
    pub converged: bool,
    pub termination: Termination,
    pub iterations: u32,
    /// Sharpe ratio of the weights before snapping.
    pub raw_sharpe_ratio: f64,
    pub raw_weight_sum: f64,
    pub snapped_weight_sum: f64,
    pub return_periods: usize,
    pub dropped_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioOptimizationOutput {
    pub positions: Vec<AssetPosition>,
    /// Metrics of the snapped weights.
    pub metrics: PortfolioMetrics,
    pub risk_free_rate: Rate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investment_amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_cash: Option<Money>,
    pub diagnostics: SolverDiagnostics,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Price history → returns model → max-Sharpe weights → metrics → allocation.
pub fn optimize_portfolio(
    input: &PortfolioOptimizationInput,
) -> PortfolioOptResult<ComputationOutput<PortfolioOptimizationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let config = &input.config;
    config.validate()?;

    let history = &input.price_history;
    config.check_feasible(history.n_assets())?;

    let estimate = ReturnsModel::new(config.trading_days)?.estimate(history)?;
    let dropped = estimate.log_returns.dropped_rows();
    if dropped > 0 {
        warnings.push(format!(
            "{} return row(s) dropped because at least one asset had a price gap",
            dropped
        ));
    }

    let solution = optimize_max_sharpe(&estimate, input.risk_free_rate, config)?;
    if !solution.converged {
        warnings.push(format!(
            "Optimizer did not converge ({:?} after {} iterations); weights are the best iterate found",
            solution.termination, solution.iterations
        ));
    }
    let shortfall = 1.0 - solution.snapped_weight_sum;
    if shortfall > 1e-6 {
        warnings.push(format!(
            "Snapped weights sum to {:.6}; {:.4}% of the budget is unassigned",
            solution.snapped_weight_sum,
            shortfall * 100.0
        ));
    }

    let metrics = calculate_metrics(
        &solution.weights,
        &estimate.log_returns,
        &estimate.covariance,
        input.risk_free_rate,
        config.trading_days,
    )?;

    let allocation = match input.investment_amount {
        Some(amount) => Some(derive_allocation(
            &solution.tickers,
            &solution.weights,
            amount,
            &history.latest_prices(),
            config,
        )?),
        None => None,
    };

    let positions = solution
        .tickers
        .iter()
        .zip(solution.weights.iter())
        .enumerate()
        .map(|(i, (ticker, &weight))| {
            let held = allocation.as_ref().map(|a| &a.allocations[i]);
            AssetPosition {
                ticker: ticker.clone(),
                weight,
                weight_pct: weight * 100.0,
                cash: held.map(|a| a.cash),
                shares: held.map(|a| a.shares),
            }
        })
        .collect();

    let output = PortfolioOptimizationOutput {
        positions,
        metrics,
        risk_free_rate: input.risk_free_rate,
        investment_amount: input.investment_amount,
        remaining_cash: allocation.as_ref().map(|a| a.remaining_cash),
        diagnostics: SolverDiagnostics {
            converged: solution.converged,
            termination: solution.termination,
            iterations: solution.iterations,
            raw_sharpe_ratio: solution.sharpe_ratio,
            raw_weight_sum: solution.raw_weight_sum,
            snapped_weight_sum: solution.snapped_weight_sum,
            return_periods: estimate.log_returns.n_periods(),
            dropped_rows: dropped,
        },
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Max-Sharpe mean-variance optimization (SQP, finite-difference gradients)",
        &serde_json::json!({
            "returns": "daily log-returns, sample covariance",
            "trading_days": config.trading_days,
            "bounds": [config.lower_bound, config.upper_bound],
            "weight_threshold": config.weight_threshold,
            "allocation_threshold": config.allocation_threshold,
            "renormalized_after_snapping": false,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
