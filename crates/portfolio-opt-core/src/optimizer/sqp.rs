//! Sequential quadratic programming over a box intersected with a budget
//! hyperplane.
//!
//! Each iteration linearizes the objective (central finite differences),
//! solves a quadratic model with a damped-BFGS Hessian over the linearized
//! constraints, and backtracks along the resulting direction until an Armijo
//! decrease of the L1 merit function is reached. The budget row and the
//! bounds are linear, so every accepted iterate stays feasible.

use serde::{Deserialize, Serialize};

use super::linalg::{identity, inf_norm, mat_vec_multiply, vec_dot};
use super::qp::{solve_budget_qp, QpError};
use crate::error::PortfolioOptError;
use crate::PortfolioOptResult;

/// Sufficient-decrease constant of the Armijo test.
const ARMIJO_C1: f64 = 1e-4;
/// Halvings tried before giving up on a direction.
const MAX_BACKTRACKS: u32 = 40;
/// cbrt(machine epsilon): balances truncation and rounding error of central differences.
const FD_STEP: f64 = 6.055_454_452_393_343e-6;

/// A scalar function of the decision vector.
pub trait Objective {
    fn dimension(&self) -> usize;

    fn value(&self, x: &[f64]) -> PortfolioOptResult<f64>;

    /// Central-difference gradient. Override when an analytic form is available.
    fn gradient(&self, x: &[f64]) -> PortfolioOptResult<Vec<f64>> {
        let mut probe = x.to_vec();
        let mut grad = Vec::with_capacity(x.len());
        for i in 0..x.len() {
            let h = FD_STEP * x[i].abs().max(1.0);
            probe[i] = x[i] + h;
            let f_plus = self.value(&probe)?;
            probe[i] = x[i] - h;
            let f_minus = self.value(&probe)?;
            probe[i] = x[i];
            grad.push((f_plus - f_minus) / (2.0 * h));
        }
        Ok(grad)
    }
}

/// `lower ≤ x ≤ upper` and `Σ x = budget`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConstraints {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub budget: f64,
}

impl BudgetConstraints {
    /// Same bounds for every coordinate.
    pub fn uniform(n: usize, lower: f64, upper: f64, budget: f64) -> Self {
        Self {
            lower: vec![lower; n],
            upper: vec![upper; n],
            budget,
        }
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    /// `|Σ x - budget|` plus the total bound excess.
    pub fn violation(&self, x: &[f64]) -> f64 {
        let budget = (x.iter().sum::<f64>() - self.budget).abs();
        let bounds: f64 = x
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .map(|(xi, (lo, hi))| (lo - xi).max(0.0) + (xi - hi).max(0.0))
            .sum();
        budget + bounds
    }

    fn clamp(&self, x: &mut [f64]) {
        for (xi, (lo, hi)) in x.iter_mut().zip(self.lower.iter().zip(self.upper.iter())) {
            *xi = xi.clamp(*lo, *hi);
        }
    }

    /// Euclidean projection onto the feasible set: `x_i = clamp(y_i - τ)`
    /// with τ found by bisection so that the budget holds.
    pub fn project(&self, y: &[f64]) -> Vec<f64> {
        let shifted = |tau: f64| -> Vec<f64> {
            y.iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .map(|(yi, (lo, hi))| (yi - tau).clamp(*lo, *hi))
                .collect()
        };
        let mut lo_tau = y
            .iter()
            .zip(self.upper.iter())
            .map(|(yi, hi)| yi - hi)
            .fold(f64::INFINITY, f64::min);
        let mut hi_tau = y
            .iter()
            .zip(self.lower.iter())
            .map(|(yi, lo)| yi - lo)
            .fold(f64::NEG_INFINITY, f64::max);
        // Σ clamp(y - τ) is non-increasing in τ: at lo_tau every coordinate
        // sits at its upper bound, at hi_tau at its lower bound.
        for _ in 0..200 {
            let mid = 0.5 * (lo_tau + hi_tau);
            let total: f64 = shifted(mid).iter().sum();
            if total > self.budget {
                lo_tau = mid;
            } else {
                hi_tau = mid;
            }
            if hi_tau - lo_tau <= f64::EPSILON * (1.0 + mid.abs()) {
                break;
            }
        }
        shifted(0.5 * (lo_tau + hi_tau))
    }

    fn validate(&self, n: usize) -> PortfolioOptResult<()> {
        if self.lower.len() != n || self.upper.len() != n {
            return Err(PortfolioOptError::InvalidInput {
                field: "constraints".into(),
                reason: format!(
                    "Expected {} bounds but got {} lower / {} upper",
                    n,
                    self.lower.len(),
                    self.upper.len()
                ),
            });
        }
        if let Some(i) = (0..n).find(|&i| self.lower[i] > self.upper[i]) {
            return Err(PortfolioOptError::InvalidInput {
                field: format!("constraints[{}]", i),
                reason: format!("lower {} > upper {}", self.lower[i], self.upper[i]),
            });
        }
        let min_total: f64 = self.lower.iter().sum();
        let max_total: f64 = self.upper.iter().sum();
        let slack = 1e-12 * (1.0 + self.budget.abs());
        if self.budget < min_total - slack || self.budget > max_total + slack {
            return Err(PortfolioOptError::InfeasibleConstraints(format!(
                "budget {} outside attainable range [{}, {}]",
                self.budget, min_total, max_total
            )));
        }
        Ok(())
    }
}

/// Solver knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SqpSettings {
    pub max_iterations: u32,
    pub tolerance: f64,
}

impl Default for SqpSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-8,
        }
    }
}

/// Why the iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The quadratic model returned a (numerically) zero direction.
    StationaryPoint,
    /// Accepted step fell below the tolerance.
    StepTolerance,
    /// Objective change fell below the tolerance.
    ObjectiveTolerance,
    /// No step length produced sufficient decrease.
    LineSearchFailed,
    /// Iteration cap reached.
    IterationLimit,
}

/// Result of [`SqpSolver::minimize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqpSolution {
    /// Best (last accepted) iterate.
    pub x: Vec<f64>,
    pub objective: f64,
    pub iterations: u32,
    pub converged: bool,
    pub termination: Termination,
    pub constraint_violation: f64,
}

/// Deterministic SQP driver. Same objective, constraints and start point
/// always yield the same iterates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqpSolver {
    settings: SqpSettings,
}

impl SqpSolver {
    pub fn new(settings: SqpSettings) -> Self {
        Self { settings }
    }

    pub fn minimize<O: Objective>(
        &self,
        objective: &O,
        constraints: &BudgetConstraints,
        x0: &[f64],
    ) -> PortfolioOptResult<SqpSolution> {
        let n = objective.dimension();
        if x0.len() != n {
            return Err(PortfolioOptError::InvalidInput {
                field: "x0".into(),
                reason: format!("Expected {} components but got {}", n, x0.len()),
            });
        }
        constraints.validate(n)?;

        let tol = self.settings.tolerance;
        let mut x = if constraints.violation(x0) > tol {
            tracing::debug!("start point infeasible, projecting onto constraint set");
            constraints.project(x0)
        } else {
            x0.to_vec()
        };

        let mut f = objective.value(&x)?;
        let mut g = objective.gradient(&x)?;
        let mut hessian = identity(n);
        let mut penalty = 1.0_f64;

        let mut iterations = 0u32;
        let mut termination = Termination::IterationLimit;

        while iterations < self.settings.max_iterations {
            iterations += 1;

            let lower_d: Vec<f64> = (0..n).map(|i| (constraints.lower[i] - x[i]).min(0.0)).collect();
            let upper_d: Vec<f64> = (0..n).map(|i| (constraints.upper[i] - x[i]).max(0.0)).collect();

            let qp = match solve_budget_qp(&hessian, &g, &lower_d, &upper_d) {
                Ok(sol) => sol,
                Err(QpError::SingularKkt) => {
                    tracing::debug!(iteration = iterations, "singular quadratic model, resetting Hessian");
                    hessian = identity(n);
                    solve_budget_qp(&hessian, &g, &lower_d, &upper_d).map_err(|_| {
                        PortfolioOptError::ConvergenceFailure {
                            function: "sqp quadratic subproblem".into(),
                            iterations,
                            last_delta: f64::NAN,
                        }
                    })?
                }
            };
            if !qp.optimal {
                tracing::debug!(
                    iteration = iterations,
                    passes = qp.iterations,
                    "quadratic subproblem hit its pass limit, using last direction"
                );
            }
            let direction = qp.step;

            if inf_norm(&direction) < tol {
                termination = Termination::StationaryPoint;
                break;
            }

            penalty = penalty.max(2.0 * qp.multiplier.abs());
            let merit = |fx: f64, point: &[f64]| fx + penalty * constraints.violation(point);
            let merit_x = merit(f, &x);
            let slope = vec_dot(&g, &direction);

            if slope >= 0.0 {
                // The model found no descent direction.
                termination = if slope.abs() <= tol * (1.0 + f.abs()) {
                    Termination::StationaryPoint
                } else {
                    Termination::LineSearchFailed
                };
                break;
            }

            let mut alpha = 1.0_f64;
            let mut accepted: Option<(Vec<f64>, f64)> = None;
            for _ in 0..MAX_BACKTRACKS {
                let mut trial: Vec<f64> = x
                    .iter()
                    .zip(direction.iter())
                    .map(|(xi, di)| xi + alpha * di)
                    .collect();
                constraints.clamp(&mut trial);

                match objective.value(&trial) {
                    Ok(ft) if ft.is_finite() => {
                        if merit(ft, &trial) <= merit_x + ARMIJO_C1 * alpha * slope {
                            accepted = Some((trial, ft));
                            break;
                        }
                    }
                    Ok(_) | Err(PortfolioOptError::DivisionByZero { .. }) => {
                        tracing::trace!(alpha, "rejected trial point");
                    }
                    Err(e) => return Err(e),
                }
                alpha *= 0.5;
            }

            let Some((x_new, f_new)) = accepted else {
                // Decrease below rounding level counts as stationary.
                termination = if slope.abs() <= tol * (1.0 + f.abs()) {
                    Termination::StationaryPoint
                } else {
                    Termination::LineSearchFailed
                };
                break;
            };

            let g_new = objective.gradient(&x_new)?;
            let s: Vec<f64> = x_new.iter().zip(x.iter()).map(|(a, b)| a - b).collect();
            let y: Vec<f64> = g_new.iter().zip(g.iter()).map(|(a, b)| a - b).collect();
            damped_bfgs_update(&mut hessian, &s, &y);

            let step_norm = inf_norm(&s);
            let delta_f = f - f_new;
            x = x_new;
            f = f_new;
            g = g_new;

            tracing::debug!(iteration = iterations, objective = f, step = step_norm, alpha, "sqp iteration");

            let violation = constraints.violation(&x);
            if step_norm < tol && violation < tol {
                termination = Termination::StepTolerance;
                break;
            }
            if delta_f.abs() < tol && step_norm < tol.sqrt() && violation < tol {
                termination = Termination::ObjectiveTolerance;
                break;
            }
        }

        let mut violation = constraints.violation(&x);
        if violation > tol {
            x = constraints.project(&x);
            f = objective.value(&x)?;
            violation = constraints.violation(&x);
        }

        let converged = !matches!(
            termination,
            Termination::IterationLimit | Termination::LineSearchFailed
        );

        if converged {
            tracing::info!(iterations, objective = f, ?termination, "sqp converged");
        } else {
            tracing::warn!(
                iterations,
                objective = f,
                ?termination,
                "sqp did not converge, returning best iterate"
            );
        }

        Ok(SqpSolution {
            x,
            objective: f,
            iterations,
            converged,
            termination,
            constraint_violation: violation,
        })
    }
}

/// Powell-damped BFGS update, keeping the model Hessian positive definite.
fn damped_bfgs_update(hessian: &mut [Vec<f64>], s: &[f64], y: &[f64]) {
    let bs = mat_vec_multiply(hessian, s);
    let sbs = vec_dot(s, &bs);
    if sbs <= f64::EPSILON * vec_dot(s, s).max(f64::MIN_POSITIVE) {
        return;
    }
    let sy = vec_dot(s, y);
    let theta = if sy >= 0.2 * sbs {
        1.0
    } else {
        0.8 * sbs / (sbs - sy)
    };
    let r: Vec<f64> = y
        .iter()
        .zip(bs.iter())
        .map(|(yi, bsi)| theta * yi + (1.0 - theta) * bsi)
        .collect();
    let sr = vec_dot(s, &r);
    if sr <= 0.0 {
        return;
    }
    for (i, row) in hessian.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell += r[i] * r[j] / sr - bs[i] * bs[j] / sbs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// ½ Σ (x_i - c_i)². The constrained minimizer is the projection of c.
    struct Quadratic {
        centre: Vec<f64>,
    }

    impl Objective for Quadratic {
        fn dimension(&self) -> usize {
            self.centre.len()
        }

        fn value(&self, x: &[f64]) -> PortfolioOptResult<f64> {
            Ok(0.5 * x.iter().zip(&self.centre).map(|(a, c)| (a - c).powi(2)).sum::<f64>())
        }
    }

    /// Rosenbrock in the first two coordinates plus a quadratic tail.
    struct Banana;

    impl Objective for Banana {
        fn dimension(&self) -> usize {
            3
        }

        fn value(&self, x: &[f64]) -> PortfolioOptResult<f64> {
            Ok(100.0 * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2) + x[2] * x[2])
        }
    }

    #[test]
    fn test_quadratic_interior_minimum() {
        let obj = Quadratic {
            centre: vec![0.5, 0.3, 0.2],
        };
        let cons = BudgetConstraints::uniform(3, 0.0, 1.0, 1.0);
        let sol = SqpSolver::default().minimize(&obj, &cons, &[1.0 / 3.0; 3]).unwrap();
        assert!(sol.converged);
        for (xi, ci) in sol.x.iter().zip(&obj.centre) {
            assert_relative_eq!(*xi, *ci, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_quadratic_projection_hits_bound() {
        // Projection of (0.9, 0.6, -0.5) onto {Σ=1, 0 ≤ x ≤ 0.5} is (0.5, 0.5, 0).
        let obj = Quadratic {
            centre: vec![0.9, 0.6, -0.5],
        };
        let cons = BudgetConstraints::uniform(3, 0.0, 0.5, 1.0);
        let sol = SqpSolver::default().minimize(&obj, &cons, &[1.0 / 3.0; 3]).unwrap();
        assert!(sol.converged);
        assert_relative_eq!(sol.x[0], 0.5, epsilon = 1e-7);
        assert_relative_eq!(sol.x[1], 0.5, epsilon = 1e-7);
        assert_relative_eq!(sol.x[2], 0.0, epsilon = 1e-7);
        assert!(sol.constraint_violation < 1e-8);
    }

    #[test]
    fn test_nonlinear_objective_respects_constraints() {
        let cons = BudgetConstraints::uniform(3, -2.0, 2.0, 1.5);
        let sol = SqpSolver::new(SqpSettings {
            max_iterations: 500,
            tolerance: 1e-10,
        })
        .minimize(&Banana, &cons, &[0.5, 0.5, 0.5])
        .unwrap();
        let sum: f64 = sol.x.iter().sum();
        assert_relative_eq!(sum, 1.5, epsilon = 1e-9);
        for xi in &sol.x {
            assert!(*xi >= -2.0 - 1e-12 && *xi <= 2.0 + 1e-12);
        }
        assert!(sol.objective < Banana.value(&[0.5, 0.5, 0.5]).unwrap());
    }

    #[test]
    fn test_iteration_limit_reports_non_convergence() {
        let cons = BudgetConstraints::uniform(3, -2.0, 2.0, 1.5);
        let sol = SqpSolver::new(SqpSettings {
            max_iterations: 1,
            tolerance: 1e-12,
        })
        .minimize(&Banana, &cons, &[0.5, 0.5, 0.5])
        .unwrap();
        assert!(!sol.converged);
        assert_eq!(sol.termination, Termination::IterationLimit);
        assert_eq!(sol.iterations, 1);
    }

    #[test]
    fn test_deterministic() {
        let obj = Quadratic {
            centre: vec![0.7, 0.1, 0.4, -0.2],
        };
        let cons = BudgetConstraints::uniform(4, 0.0, 0.5, 1.0);
        let a = SqpSolver::default().minimize(&obj, &cons, &[0.25; 4]).unwrap();
        let b = SqpSolver::default().minimize(&obj, &cons, &[0.25; 4]).unwrap();
        assert_eq!(a.x, b.x);
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn test_infeasible_start_is_projected() {
        let obj = Quadratic {
            centre: vec![0.5, 0.5],
        };
        let cons = BudgetConstraints::uniform(2, 0.0, 1.0, 1.0);
        let sol = SqpSolver::default().minimize(&obj, &cons, &[2.0, 2.0]).unwrap();
        assert_relative_eq!(sol.x[0] + sol.x[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unreachable_budget_rejected() {
        let obj = Quadratic {
            centre: vec![0.5, 0.5],
        };
        let cons = BudgetConstraints::uniform(2, 0.0, 0.4, 1.0);
        assert!(matches!(
            SqpSolver::default().minimize(&obj, &cons, &[0.4, 0.4]),
            Err(PortfolioOptError::InfeasibleConstraints(_))
        ));
    }

    #[test]
    fn test_projection() {
        let cons = BudgetConstraints::uniform(3, 0.0, 0.5, 1.0);
        let p = cons.project(&[0.9, 0.6, -0.5]);
        assert_relative_eq!(p[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(p[1], 0.5, epsilon = 1e-12);
        assert_relative_eq!(p[2], 0.0, epsilon = 1e-12);
    }
}
