//! Quadratic subproblem of the SQP iteration.
//!
//! minimize    ½ dᵀ H d + gᵀ d
//! subject to  Σ d_i = 0
//!             lower_i ≤ d_i ≤ upper_i        (lower_i ≤ 0 ≤ upper_i)
//!
//! Solved with a primal active-set method started from the feasible point
//! d = 0. Each pass solves the equality-constrained KKT system over the free
//! coordinates, then either takes the longest feasible step toward that
//! solution (fixing the first blocking bound) or, when the step vanishes,
//! releases the bound whose multiplier has the wrong sign.

use super::linalg::{inf_norm, mat_vec_multiply, solve_linear_system};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundState {
    Free,
    AtLower,
    AtUpper,
    /// lower == upper; never released.
    Fixed,
}

/// Solution of one quadratic subproblem.
#[derive(Debug, Clone)]
pub(crate) struct QpSolution {
    /// Search direction.
    pub step: Vec<f64>,
    /// Multiplier of the budget row.
    pub multiplier: f64,
    /// Active-set passes used.
    pub iterations: usize,
    /// False if the pass limit was hit before the KKT conditions held.
    pub optimal: bool,
}

/// Reasons the subproblem could not be solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QpError {
    /// Reduced KKT matrix was singular (H not positive definite on the free set).
    SingularKkt,
}

pub(crate) fn solve_budget_qp(
    hessian: &[Vec<f64>],
    gradient: &[f64],
    lower: &[f64],
    upper: &[f64],
) -> Result<QpSolution, QpError> {
    let n = gradient.len();
    let mut d = vec![0.0; n];
    let mut state: Vec<BoundState> = (0..n)
        .map(|i| {
            if upper[i] - lower[i] <= 0.0 {
                BoundState::Fixed
            } else {
                BoundState::Free
            }
        })
        .collect();

    let grad_scale = 1.0 + inf_norm(gradient);
    let step_tol = 1e-15;
    let mult_tol = 1e-12 * grad_scale;
    let max_passes = 10 * n + 20;
    let mut multiplier = 0.0;

    for pass in 1..=max_passes {
        let free: Vec<usize> = (0..n).filter(|&i| state[i] == BoundState::Free).collect();

        let hd = mat_vec_multiply(hessian, &d);
        let grad_q: Vec<f64> = hd.iter().zip(gradient.iter()).map(|(a, b)| a + b).collect();

        let p_free = if free.is_empty() {
            Vec::new()
        } else {
            let (p, lambda) = solve_reduced_kkt(hessian, &grad_q, &free)?;
            multiplier = lambda;
            p
        };

        if inf_norm(&p_free) <= step_tol {
            // Stationary on the current working set: check bound multipliers.
            // r_i = ∂q/∂d_i + λ must be ≥ 0 at a lower bound, ≤ 0 at an upper bound.
            let mut worst: Option<(usize, f64)> = None;
            for i in 0..n {
                let r = grad_q[i] + multiplier;
                let violation = match state[i] {
                    BoundState::AtLower if r < -mult_tol => -r,
                    BoundState::AtUpper if r > mult_tol => r,
                    _ => continue,
                };
                if worst.map_or(true, |(_, v)| violation > v) {
                    worst = Some((i, violation));
                }
            }
            match worst {
                Some((i, _)) => {
                    state[i] = BoundState::Free;
                    continue;
                }
                None => {
                    return Ok(QpSolution {
                        step: d,
                        multiplier,
                        iterations: pass,
                        optimal: true,
                    });
                }
            }
        }

        // Ratio test against the bounds of the free coordinates.
        let mut alpha = 1.0_f64;
        let mut blocking: Option<(usize, BoundState)> = None;
        for (k, &i) in free.iter().enumerate() {
            let p = p_free[k];
            if p < 0.0 {
                let t = (lower[i] - d[i]) / p;
                if t < alpha {
                    alpha = t;
                    blocking = Some((i, BoundState::AtLower));
                }
            } else if p > 0.0 {
                let t = (upper[i] - d[i]) / p;
                if t < alpha {
                    alpha = t;
                    blocking = Some((i, BoundState::AtUpper));
                }
            }
        }
        let alpha = alpha.max(0.0);

        for (k, &i) in free.iter().enumerate() {
            d[i] += alpha * p_free[k];
        }
        if let Some((i, bound)) = blocking {
            d[i] = if bound == BoundState::AtLower {
                lower[i]
            } else {
                upper[i]
            };
            state[i] = bound;
        }
    }

    Ok(QpSolution {
        step: d,
        multiplier,
        iterations: max_passes,
        optimal: false,
    })
}

/// Solve
/// ```text
/// [ H_FF  1 ] [ p ]   [ -∇q_F ]
/// [ 1ᵀ    0 ] [ λ ] = [   0   ]
/// ```
/// over the free index set F.
fn solve_reduced_kkt(
    hessian: &[Vec<f64>],
    grad_q: &[f64],
    free: &[usize],
) -> Result<(Vec<f64>, f64), QpError> {
    let m = free.len();
    let mut kkt = vec![vec![0.0; m + 1]; m + 1];
    let mut rhs = vec![0.0; m + 1];
    for (a, &i) in free.iter().enumerate() {
        for (b, &j) in free.iter().enumerate() {
            kkt[a][b] = hessian[i][j];
        }
        kkt[a][m] = 1.0;
        kkt[m][a] = 1.0;
        rhs[a] = -grad_q[i];
    }
    let sol = solve_linear_system(&kkt, &rhs).ok_or(QpError::SingularKkt)?;
    let lambda = sol[m];
    Ok((sol[..m].to_vec(), lambda))
}
