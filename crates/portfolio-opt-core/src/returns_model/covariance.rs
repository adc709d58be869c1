use serde::{Deserialize, Serialize};

use super::log_returns::LogReturns;
use crate::error::PortfolioOptError;
use crate::PortfolioOptResult;

/// Square symmetric covariance matrix of annualized log-returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct CovarianceMatrix {
    values: Vec<Vec<f64>>,
}

impl CovarianceMatrix {
    /// Sample covariance (n - 1 denominator) of the return columns, scaled
    /// by `annualization`.
    #[allow(clippy::needless_range_loop)]
    pub fn from_log_returns(returns: &LogReturns, annualization: f64) -> PortfolioOptResult<Self> {
        let n = returns.n_assets();
        let periods = returns.n_periods();
        if periods < 2 {
            return Err(PortfolioOptError::InsufficientData {
                asset: returns.tickers().join(","),
                reason: format!("{} return period(s); sample covariance needs 2", periods),
            });
        }

        let means = returns.mean_returns();
        let mut cov = vec![vec![0.0; n]; n];
        for row in returns.rows() {
            for i in 0..n {
                let di = row[i] - means[i];
                for j in i..n {
                    cov[i][j] += di * (row[j] - means[j]);
                }
            }
        }

        let scale = annualization / (periods as f64 - 1.0);
        for i in 0..n {
            for j in i..n {
                let v = cov[i][j] * scale;
                cov[i][j] = v;
                cov[j][i] = v;
            }
        }

        Ok(Self { values: cov })
    }

    /// Wrap an externally supplied matrix after checking shape and symmetry.
    pub fn from_rows(values: Vec<Vec<f64>>) -> PortfolioOptResult<Self> {
        validate_covariance_matrix(&values)?;
        Ok(Self { values })
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }

    /// Per-asset standalone volatility, `sqrt(Σ_ii)`.
    pub fn asset_volatilities(&self) -> Vec<f64> {
        (0..self.dim()).map(|i| self.values[i][i].max(0.0).sqrt()).collect()
    }

    /// `w' Σ w`.
    pub fn quadratic_form(&self, w: &[f64]) -> f64 {
        self.values
            .iter()
            .zip(w.iter())
            .map(|(row, wi)| wi * row.iter().zip(w.iter()).map(|(s, wj)| s * wj).sum::<f64>())
            .sum()
    }
}

impl TryFrom<Vec<Vec<f64>>> for CovarianceMatrix {
    type Error = PortfolioOptError;

    fn try_from(values: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        CovarianceMatrix::from_rows(values)
    }
}

impl From<CovarianceMatrix> for Vec<Vec<f64>> {
    fn from(m: CovarianceMatrix) -> Self {
        m.values
    }
}

#[allow(clippy::needless_range_loop)]
fn validate_covariance_matrix(cov: &[Vec<f64>]) -> PortfolioOptResult<()> {
    let n = cov.len();
    if n == 0 {
        return Err(PortfolioOptError::InvalidInput {
            field: "covariance_matrix".into(),
            reason: "Matrix must have at least one row".into(),
        });
    }
    for (i, row) in cov.iter().enumerate() {
        if row.len() != n {
            return Err(PortfolioOptError::InvalidInput {
                field: "covariance_matrix".into(),
                reason: format!("Row {} has {} columns, expected {}", i, row.len(), n),
            });
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(PortfolioOptError::InvalidInput {
                field: "covariance_matrix".into(),
                reason: format!("Row {} holds a non-finite value", i),
            });
        }
        if row[i] < 0.0 {
            return Err(PortfolioOptError::InvalidInput {
                field: "covariance_matrix".into(),
                reason: format!("Negative variance on diagonal [{},{}]={}", i, i, row[i]),
            });
        }
    }
    let tolerance = 1e-10;
    for i in 0..n {
        for j in (i + 1)..n {
            let scale = cov[i][j].abs().max(cov[j][i].abs()).max(1.0);
            if (cov[i][j] - cov[j][i]).abs() > tolerance * scale {
                return Err(PortfolioOptError::InvalidInput {
                    field: "covariance_matrix".into(),
                    reason: format!(
                        "Not symmetric: [{},{}]={} != [{},{}]={}",
                        i, j, cov[i][j], j, i, cov[j][i]
                    ),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sample_covariance_annualized() {
        // A: mean 0.02, deviations -0.01, +0.01; B: mean 0.01, deviations -0.03, +0.03
        let lr = LogReturns::from_rows(
            vec!["A".into(), "B".into()],
            vec![vec![0.01, -0.02], vec![0.03, 0.04]],
        )
        .unwrap();
        let cov = CovarianceMatrix::from_log_returns(&lr, 252.0).unwrap();
        // var_A = (1e-4 + 1e-4) / 1 = 2e-4
        assert_relative_eq!(cov.get(0, 0), 2e-4 * 252.0, epsilon = 1e-12);
        // cov_AB = (-0.01*-0.03 + 0.01*0.03) / 1 = 6e-4
        assert_relative_eq!(cov.get(0, 1), 6e-4 * 252.0, epsilon = 1e-12);
        assert_eq!(cov.get(0, 1), cov.get(1, 0));
        assert_relative_eq!(cov.get(1, 1), 1.8e-3 * 252.0, epsilon = 1e-12);
    }

    #[test]
    fn test_asymmetric_rejected() {
        let err = CovarianceMatrix::from_rows(vec![vec![0.04, 0.01], vec![0.02, 0.09]]).unwrap_err();
        assert!(err.to_string().contains("Not symmetric"));
    }

    #[test]
    fn test_non_square_rejected() {
        assert!(CovarianceMatrix::from_rows(vec![vec![0.04, 0.01]]).is_err());
    }

    #[test]
    fn test_quadratic_form() {
        let cov = CovarianceMatrix::from_rows(vec![vec![0.04, 0.006], vec![0.006, 0.01]]).unwrap();
        let w = [0.6, 0.4];
        let expected = 0.36 * 0.04 + 2.0 * 0.24 * 0.006 + 0.16 * 0.01;
        assert_relative_eq!(cov.quadratic_form(&w), expected, epsilon = 1e-15);
        assert_relative_eq!(cov.asset_volatilities()[0], 0.2, epsilon = 1e-15);
    }
}
