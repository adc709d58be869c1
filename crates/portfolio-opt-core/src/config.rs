use serde::{Deserialize, Serialize};

use crate::error::PortfolioOptError;
use crate::types::TRADING_DAYS_PER_YEAR;
use crate::PortfolioOptResult;

/// Tunables for the max-Sharpe solve and the downstream allocation.
///
/// Every field has a default, so a partial JSON/YAML document (or `{}`)
/// deserializes into a usable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Per-asset minimum weight (0 for long-only).
    pub lower_bound: f64,
    /// Per-asset maximum weight.
    pub upper_bound: f64,
    /// SQP iteration cap.
    pub max_iterations: u32,
    /// Step-size / objective-change / constraint-violation tolerance.
    pub tolerance: f64,
    /// Weights below this are snapped to zero after the solve.
    pub weight_threshold: f64,
    /// Cash amounts and share counts below this are snapped to zero.
    pub allocation_threshold: f64,
    /// Annualization factor for daily log-returns.
    pub trading_days: f64,
    /// Turn non-convergence into a hard error instead of a warning.
    pub require_convergence: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            lower_bound: 0.0,
            upper_bound: 0.5,
            max_iterations: 100,
            tolerance: 1e-8,
            weight_threshold: 1e-2,
            allocation_threshold: 1e-2,
            trading_days: TRADING_DAYS_PER_YEAR,
            require_convergence: false,
        }
    }
}

impl OptimizerConfig {
    /// Check field ranges. Feasibility against the asset count is checked
    /// separately by [`OptimizerConfig::check_feasible`].
    pub fn validate(&self) -> PortfolioOptResult<()> {
        if !self.lower_bound.is_finite() || !self.upper_bound.is_finite() {
            return Err(PortfolioOptError::InvalidInput {
                field: "bounds".into(),
                reason: "Weight bounds must be finite".into(),
            });
        }
        if self.lower_bound > self.upper_bound {
            return Err(PortfolioOptError::InvalidInput {
                field: "bounds".into(),
                reason: format!(
                    "lower_bound {} exceeds upper_bound {}",
                    self.lower_bound, self.upper_bound
                ),
            });
        }
        if self.max_iterations == 0 {
            return Err(PortfolioOptError::InvalidInput {
                field: "max_iterations".into(),
                reason: "Must be at least 1".into(),
            });
        }
        if !(self.tolerance > 0.0) {
            return Err(PortfolioOptError::InvalidInput {
                field: "tolerance".into(),
                reason: "Must be positive".into(),
            });
        }
        if self.weight_threshold < 0.0 || self.allocation_threshold < 0.0 {
            return Err(PortfolioOptError::InvalidInput {
                field: "threshold".into(),
                reason: "Snapping thresholds must be non-negative".into(),
            });
        }
        if !(self.trading_days > 0.0) {
            return Err(PortfolioOptError::InvalidInput {
                field: "trading_days".into(),
                reason: "Must be positive".into(),
            });
        }
        Ok(())
    }

    /// The box `[lower, upper]^n` must intersect the budget hyperplane.
    pub fn check_feasible(&self, n_assets: usize) -> PortfolioOptResult<()> {
        let n = n_assets as f64;
        let slack = 1e-12;
        if self.upper_bound * n < 1.0 - slack {
            return Err(PortfolioOptError::InfeasibleConstraints(format!(
                "upper bound {} x {} assets = {} cannot reach full investment",
                self.upper_bound,
                n_assets,
                self.upper_bound * n
            )));
        }
        if self.lower_bound * n > 1.0 + slack {
            return Err(PortfolioOptError::InfeasibleConstraints(format!(
                "lower bound {} x {} assets = {} exceeds full investment",
                self.lower_bound,
                n_assets,
                self.lower_bound * n
            )));
        }
        Ok(())
    }
}
