use serde::{Deserialize, Serialize};

use super::sqp::{BudgetConstraints, Objective, SqpSettings, SqpSolver, Termination};
use crate::config::OptimizerConfig;
use crate::error::PortfolioOptError;
use crate::objective::annualized_sharpe_ratio;
use crate::returns_model::{CovarianceMatrix, LogReturns, ReturnsEstimate};
use crate::snapping::snap_weights;
use crate::types::{Rate, WeightVector};
use crate::PortfolioOptResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// `-sharpe(w)`: minimizing it maximizes the Sharpe ratio.
#[derive(Debug, Clone, Copy)]
pub struct NegativeSharpe<'a> {
    pub log_returns: &'a LogReturns,
    pub covariance: &'a CovarianceMatrix,
    pub risk_free_rate: Rate,
    pub trading_days: f64,
}

impl<'a> NegativeSharpe<'a> {
    pub fn new(estimate: &'a ReturnsEstimate, risk_free_rate: Rate) -> Self {
        Self {
            log_returns: &estimate.log_returns,
            covariance: &estimate.covariance,
            risk_free_rate,
            trading_days: estimate.trading_days,
        }
    }
}

impl Objective for NegativeSharpe<'_> {
    fn dimension(&self) -> usize {
        self.log_returns.n_assets()
    }

    fn value(&self, x: &[f64]) -> PortfolioOptResult<f64> {
        let sharpe = annualized_sharpe_ratio(
            x,
            self.log_returns,
            self.covariance,
            self.risk_free_rate,
            self.trading_days,
        )?;
        Ok(-sharpe)
    }
}

/// Outcome of a max-Sharpe solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxSharpeSolution {
    pub tickers: Vec<String>,
    /// Solver output before snapping.
    pub raw_weights: WeightVector,
    /// Weights after threshold snapping (not re-normalized).
    pub weights: WeightVector,
    /// Sharpe ratio of the raw weights.
    pub sharpe_ratio: f64,
    pub iterations: u32,
    /// False when the iteration cap was hit or the line search stalled; the
    /// weights are then the best iterate found.
    pub converged: bool,
    pub termination: Termination,
    pub raw_weight_sum: f64,
    pub snapped_weight_sum: f64,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Maximize the annualized Sharpe ratio over `Σ w = 1`,
/// `lower_bound ≤ w_i ≤ upper_bound`, starting from equal weights.
///
/// The estimate must be annualized with `config.trading_days`.
/// Infeasible bounds fail before the solver runs. Non-convergence is reported
/// through [`MaxSharpeSolution::converged`] unless
/// [`OptimizerConfig::require_convergence`] is set.
pub fn optimize_max_sharpe(
    estimate: &ReturnsEstimate,
    risk_free_rate: Rate,
    config: &OptimizerConfig,
) -> PortfolioOptResult<MaxSharpeSolution> {
    config.validate()?;
    let n = estimate.log_returns.n_assets();
    config.check_feasible(n)?;
    if !risk_free_rate.is_finite() {
        return Err(PortfolioOptError::InvalidInput {
            field: "risk_free_rate".into(),
            reason: format!("Must be finite, got {}", risk_free_rate),
        });
    }

    if estimate.trading_days != config.trading_days {
        return Err(PortfolioOptError::InvalidInput {
            field: "trading_days".into(),
            reason: format!(
                "Estimate annualized with {} but config uses {}",
                estimate.trading_days, config.trading_days
            ),
        });
    }

    let objective = NegativeSharpe::new(estimate, risk_free_rate);
    let constraints = BudgetConstraints::uniform(n, config.lower_bound, config.upper_bound, 1.0);
    let x0 = vec![1.0 / n as f64; n];

    let solver = SqpSolver::new(SqpSettings {
        max_iterations: config.max_iterations,
        tolerance: config.tolerance,
    });
    let solution = solver.minimize(&objective, &constraints, &x0)?;

    if !solution.converged && config.require_convergence {
        return Err(PortfolioOptError::ConvergenceFailure {
            function: "max-Sharpe SQP".into(),
            iterations: solution.iterations,
            last_delta: solution.constraint_violation,
        });
    }

    let weights = snap_weights(&solution.x, config.weight_threshold);
    let raw_weight_sum = solution.x.iter().sum();
    let snapped_weight_sum = weights.iter().sum();

    Ok(MaxSharpeSolution {
        tickers: estimate.tickers().to_vec(),
        raw_weights: solution.x,
        weights,
        sharpe_ratio: -solution.objective,
        iterations: solution.iterations,
        converged: solution.converged,
        termination: solution.termination,
        raw_weight_sum,
        snapped_weight_sum,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::sharpe_ratio;
    use approx::assert_relative_eq;
    use tracing_test::traced_test;

    fn estimate_from(tickers: &[&str], rows: Vec<Vec<f64>>) -> ReturnsEstimate {
        let log_returns =
            LogReturns::from_rows(tickers.iter().map(|t| t.to_string()).collect(), rows).unwrap();
        let covariance = CovarianceMatrix::from_log_returns(&log_returns, 252.0).unwrap();
        ReturnsEstimate {
            log_returns,
            covariance,
            trading_days: 252.0,
        }
    }

    fn three_assets() -> ReturnsEstimate {
        estimate_from(
            &["A", "B", "C"],
            vec![
                vec![0.020, 0.004, -0.010],
                vec![-0.010, 0.006, 0.012],
                vec![0.015, -0.002, 0.006],
                vec![0.005, 0.008, -0.008],
                vec![-0.004, 0.003, 0.011],
                vec![0.012, 0.001, 0.003],
            ],
        )
    }

    // ------------------------------------------------------------------
    // 1. Symmetric two-asset case splits evenly
    // ------------------------------------------------------------------
    #[test]
    fn test_two_identical_uncorrelated_assets() {
        // equal means and variances, zero sample covariance
        let est = estimate_from(
            &["X", "Y"],
            vec![
                vec![0.012, 0.012],
                vec![-0.008, 0.012],
                vec![0.012, -0.008],
                vec![-0.008, -0.008],
            ],
        );
        let sol = optimize_max_sharpe(&est, 0.0, &OptimizerConfig::default()).unwrap();
        assert!(sol.converged);
        assert_relative_eq!(sol.weights[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(sol.weights[1], 0.5, epsilon = 1e-6);
    }

    // ------------------------------------------------------------------
    // 2. Budget and bounds hold at the reported solution
    // ------------------------------------------------------------------
    #[test]
    fn test_solution_feasible() {
        let cfg = OptimizerConfig::default();
        let sol = optimize_max_sharpe(&three_assets(), 0.01, &cfg).unwrap();
        assert!((sol.raw_weight_sum - 1.0).abs() < 1e-6);
        for w in &sol.raw_weights {
            assert!(*w >= -1e-9 && *w <= cfg.upper_bound + 1e-9, "w = {}", w);
        }
        assert_eq!(sol.tickers, vec!["A", "B", "C"]);
    }

    // ------------------------------------------------------------------
    // 3. No feasible grid point beats the solver
    // ------------------------------------------------------------------
    #[test]
    fn test_beats_feasible_grid() {
        let est = three_assets();
        let sol = optimize_max_sharpe(&est, 0.0, &OptimizerConfig::default()).unwrap();
        let best = sharpe_ratio(&sol.raw_weights, &est.log_returns, &est.covariance, 0.0).unwrap();
        assert_relative_eq!(best, sol.sharpe_ratio, epsilon = 1e-9);

        for i in 0..=10 {
            for j in 0..=10 {
                let a = i as f64 * 0.05;
                let b = j as f64 * 0.05;
                let c = 1.0 - a - b;
                if !(0.0..=0.5).contains(&c) {
                    continue;
                }
                let s = sharpe_ratio(&[a, b, c], &est.log_returns, &est.covariance, 0.0).unwrap();
                assert!(s <= best + 1e-6, "grid point ({}, {}, {}) has {} > {}", a, b, c, s, best);
            }
        }
    }

    // ------------------------------------------------------------------
    // 4. Infeasible bounds abort before solving
    // ------------------------------------------------------------------
    #[test]
    fn test_single_asset_infeasible_with_half_cap() {
        let est = estimate_from(&["ONLY"], vec![vec![0.01], vec![-0.02], vec![0.015]]);
        let err = optimize_max_sharpe(&est, 0.02, &OptimizerConfig::default()).unwrap_err();
        assert!(matches!(err, PortfolioOptError::InfeasibleConstraints(_)));
    }

    #[test]
    fn test_upper_bound_below_one_over_n() {
        let cfg = OptimizerConfig {
            upper_bound: 0.3,
            ..Default::default()
        };
        let err = optimize_max_sharpe(&three_assets(), 0.0, &cfg).unwrap_err();
        assert!(matches!(err, PortfolioOptError::InfeasibleConstraints(_)));
    }

    // ------------------------------------------------------------------
    // 5. Determinism
    // ------------------------------------------------------------------
    #[test]
    fn test_deterministic() {
        let est = three_assets();
        let cfg = OptimizerConfig::default();
        let a = optimize_max_sharpe(&est, 0.01, &cfg).unwrap();
        let b = optimize_max_sharpe(&est, 0.01, &cfg).unwrap();
        assert_eq!(a.raw_weights, b.raw_weights);
        assert_eq!(a.iterations, b.iterations);
    }

    // ------------------------------------------------------------------
    // 6. Non-convergence: warning by default, error on request
    // ------------------------------------------------------------------
    #[traced_test]
    #[test]
    fn test_iteration_cap_warns() {
        let cfg = OptimizerConfig {
            max_iterations: 1,
            ..Default::default()
        };
        let sol = optimize_max_sharpe(&three_assets(), 0.0, &cfg).unwrap();
        assert!(!sol.converged);
        assert!((sol.raw_weight_sum - 1.0).abs() < 1e-6);
        assert!(logs_contain("did not converge"));
    }

    #[test]
    fn test_iteration_cap_strict() {
        let cfg = OptimizerConfig {
            max_iterations: 1,
            require_convergence: true,
            ..Default::default()
        };
        let err = optimize_max_sharpe(&three_assets(), 0.0, &cfg).unwrap_err();
        assert!(matches!(err, PortfolioOptError::ConvergenceFailure { .. }));
    }

    #[test]
    fn test_annualization_mismatch_rejected() {
        let cfg = OptimizerConfig {
            trading_days: 365.0,
            ..Default::default()
        };
        match optimize_max_sharpe(&three_assets(), 0.0, &cfg).unwrap_err() {
            PortfolioOptError::InvalidInput { field, .. } => assert_eq!(field, "trading_days"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    // ------------------------------------------------------------------
    // 7. Snapped weights never exceed raw weights in magnitude
    // ------------------------------------------------------------------
    #[test]
    fn test_snapping_applied() {
        let cfg = OptimizerConfig::default();
        let sol = optimize_max_sharpe(&three_assets(), 0.0, &cfg).unwrap();
        for (raw, snapped) in sol.raw_weights.iter().zip(&sol.weights) {
            if raw.abs() < cfg.weight_threshold {
                assert_eq!(*snapped, 0.0);
            } else {
                assert_eq!(snapped, raw);
            }
        }
        assert!(sol.snapped_weight_sum <= sol.raw_weight_sum + 1e-15);
    }
}
