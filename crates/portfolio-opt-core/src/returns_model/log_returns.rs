use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::price_history::PriceHistory;
use crate::error::PortfolioOptError;
use crate::PortfolioOptResult;

/// Daily log-returns with every incomplete row removed.
///
/// `values[t][i] = ln(p[t+1][i] / p[t][i])` for the surviving rows; each row
/// is dated by the later of the two closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogReturns {
    tickers: Vec<String>,
    dates: Vec<NaiveDate>,
    values: Vec<Vec<f64>>,
    means: Vec<f64>,
    dropped_rows: usize,
}

impl LogReturns {
    /// Build log-returns from a price table.
    ///
    /// The first row has no predecessor and is discarded. Any later row where
    /// either close is missing for any asset is dropped as a whole.
    pub fn from_prices(history: &PriceHistory) -> PortfolioOptResult<Self> {
        let n = history.n_assets();
        if n == 0 {
            return Err(PortfolioOptError::InsufficientData {
                asset: "portfolio".into(),
                reason: "At least one asset required".into(),
            });
        }

        for (i, ticker) in history.tickers().iter().enumerate() {
            let count = history.valid_count(i);
            if count < 2 {
                return Err(PortfolioOptError::InsufficientData {
                    asset: ticker.clone(),
                    reason: format!("{} valid price(s); at least 2 required", count),
                });
            }
        }

        let rows = history.rows();
        let mut dates = Vec::with_capacity(rows.len().saturating_sub(1));
        let mut values = Vec::with_capacity(rows.len().saturating_sub(1));
        let mut dropped_rows = 0usize;

        for t in 1..rows.len() {
            let row: Option<Vec<f64>> = rows[t - 1]
                .iter()
                .zip(rows[t].iter())
                .map(|(prev, cur)| match (prev, cur) {
                    (Some(p0), Some(p1)) => Some((p1 / p0).ln()),
                    _ => None,
                })
                .collect();

            match row {
                Some(r) => {
                    dates.push(history.dates()[t]);
                    values.push(r);
                }
                None => dropped_rows += 1,
            }
        }

        if dropped_rows > 0 {
            tracing::debug!(dropped_rows, kept = values.len(), "dropped log-return rows with gaps");
        }

        if values.len() < 2 {
            return Err(PortfolioOptError::InsufficientData {
                asset: history.tickers().join(","),
                reason: format!(
                    "{} complete return period(s) after dropping gaps; at least 2 required",
                    values.len()
                ),
            });
        }

        let means = column_means(&values, n);

        Ok(Self {
            tickers: history.tickers().to_vec(),
            dates,
            values,
            means,
            dropped_rows,
        })
    }

    /// Build directly from a return matrix (rows = periods, columns = assets).
    pub fn from_rows(tickers: Vec<String>, values: Vec<Vec<f64>>) -> PortfolioOptResult<Self> {
        let n = tickers.len();
        if n == 0 {
            return Err(PortfolioOptError::InsufficientData {
                asset: "portfolio".into(),
                reason: "At least one asset required".into(),
            });
        }
        for (t, row) in values.iter().enumerate() {
            if row.len() != n {
                return Err(PortfolioOptError::InvalidInput {
                    field: "log_returns".into(),
                    reason: format!("Row {} has {} columns, expected {}", t, row.len(), n),
                });
            }
            if let Some(i) = row.iter().position(|v| !v.is_finite()) {
                return Err(PortfolioOptError::InvalidInput {
                    field: format!("log_returns.{}", tickers[i]),
                    reason: format!("Row {} holds a non-finite value", t),
                });
            }
        }
        if values.len() < 2 {
            return Err(PortfolioOptError::InsufficientData {
                asset: tickers.join(","),
                reason: format!("{} return period(s); at least 2 required", values.len()),
            });
        }
        let means = column_means(&values, n);
        Ok(Self {
            tickers,
            dates: Vec::new(),
            values,
            means,
            dropped_rows: 0,
        })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Dates of each surviving row. Empty when built from a bare matrix.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn n_assets(&self) -> usize {
        self.tickers.len()
    }

    pub fn n_periods(&self) -> usize {
        self.values.len()
    }

    /// Per-asset mean daily log-return.
    pub fn mean_returns(&self) -> &[f64] {
        &self.means
    }

    /// Rows discarded because a close was missing on either side.
    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }
}

fn column_means(values: &[Vec<f64>], n: usize) -> Vec<f64> {
    let rows = values.len() as f64;
    (0..n)
        .map(|i| values.iter().map(|row| row[i]).sum::<f64>() / rows)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_log_return_values() {
        let h = PriceHistory::new(
            vec!["A".into()],
            vec![d(1), d(4), d(5)],
            vec![vec![Some(100.0)], vec![Some(110.0)], vec![Some(99.0)]],
        )
        .unwrap();
        let lr = LogReturns::from_prices(&h).unwrap();
        assert_eq!(lr.n_periods(), 2);
        assert_relative_eq!(lr.rows()[0][0], (1.1f64).ln(), epsilon = 1e-15);
        assert_relative_eq!(lr.rows()[1][0], (0.9f64).ln(), epsilon = 1e-15);
        assert_eq!(lr.dates(), &[d(4), d(5)]);
    }

    #[test]
    fn test_gap_drops_both_adjacent_rows() {
        let h = PriceHistory::new(
            vec!["A".into(), "B".into()],
            vec![d(1), d(4), d(5), d(6), d(7)],
            vec![
                vec![Some(10.0), Some(20.0)],
                vec![Some(11.0), None],
                vec![Some(12.0), Some(21.0)],
                vec![Some(13.0), Some(22.0)],
                vec![Some(12.0), Some(23.0)],
            ],
        )
        .unwrap();
        let lr = LogReturns::from_prices(&h).unwrap();
        // rows ending 4th and 5th each touch the gap
        assert_eq!(lr.dropped_rows(), 2);
        assert_eq!(lr.n_periods(), 2);
        assert!(lr.rows().iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_single_price_is_insufficient() {
        let h = PriceHistory::new(
            vec!["A".into(), "B".into()],
            vec![d(1), d(4), d(5)],
            vec![
                vec![Some(10.0), None],
                vec![Some(11.0), Some(3.0)],
                vec![Some(12.0), None],
            ],
        )
        .unwrap();
        match LogReturns::from_prices(&h) {
            Err(PortfolioOptError::InsufficientData { asset, .. }) => assert_eq!(asset, "B"),
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_all_rows_dropped_is_insufficient() {
        let h = PriceHistory::new(
            vec!["A".into(), "B".into()],
            vec![d(1), d(4), d(5), d(6)],
            vec![
                vec![Some(10.0), None],
                vec![Some(11.0), Some(3.0)],
                vec![None, Some(3.1)],
                vec![Some(12.0), None],
            ],
        )
        .unwrap();
        assert!(matches!(
            LogReturns::from_prices(&h),
            Err(PortfolioOptError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_means() {
        let lr = LogReturns::from_rows(
            vec!["A".into(), "B".into()],
            vec![vec![0.01, -0.02], vec![0.03, 0.04]],
        )
        .unwrap();
        assert_relative_eq!(lr.mean_returns()[0], 0.02, epsilon = 1e-15);
        assert_relative_eq!(lr.mean_returns()[1], 0.01, epsilon = 1e-15);
    }

    #[test]
    fn test_from_rows_rejects_nan() {
        assert!(LogReturns::from_rows(vec!["A".into()], vec![vec![0.1], vec![f64::NAN]]).is_err());
    }
}
