use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::PortfolioOptError;
use crate::PortfolioOptResult;

/// Raw, unvalidated shape of a price table as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistoryData {
    /// Column identifiers, one per asset.
    pub tickers: Vec<String>,
    /// Trading dates, strictly ascending.
    pub dates: Vec<NaiveDate>,
    /// `prices[t][i]` is the adjusted close of `tickers[i]` on `dates[t]`;
    /// `None` marks a gap.
    pub prices: Vec<Vec<Option<f64>>>,
}

/// Adjusted closing prices indexed by trading date, one column per ticker.
///
/// Immutable once constructed. Gaps are `None`; every present price is
/// finite and strictly positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PriceHistoryData", into = "PriceHistoryData")]
pub struct PriceHistory {
    tickers: Vec<String>,
    dates: Vec<NaiveDate>,
    prices: Vec<Vec<Option<f64>>>,
}

impl PriceHistory {
    pub fn new(
        tickers: Vec<String>,
        dates: Vec<NaiveDate>,
        prices: Vec<Vec<Option<f64>>>,
    ) -> PortfolioOptResult<Self> {
        validate_tickers(&tickers)?;

        if dates.len() != prices.len() {
            return Err(PortfolioOptError::InvalidInput {
                field: "prices".into(),
                reason: format!(
                    "Expected {} rows (one per date) but got {}",
                    dates.len(),
                    prices.len()
                ),
            });
        }

        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(PortfolioOptError::InvalidInput {
                    field: "dates".into(),
                    reason: format!("Dates must be strictly ascending: {} then {}", pair[0], pair[1]),
                });
            }
        }

        for (t, row) in prices.iter().enumerate() {
            if row.len() != tickers.len() {
                return Err(PortfolioOptError::InvalidInput {
                    field: "prices".into(),
                    reason: format!(
                        "Row for {} has {} columns, expected {}",
                        dates[t],
                        row.len(),
                        tickers.len()
                    ),
                });
            }
            for (i, cell) in row.iter().enumerate() {
                if let Some(p) = cell {
                    if !p.is_finite() || *p <= 0.0 {
                        return Err(PortfolioOptError::InvalidInput {
                            field: format!("prices.{}", tickers[i]),
                            reason: format!("Price on {} must be positive and finite, got {}", dates[t], p),
                        });
                    }
                }
            }
        }

        Ok(Self {
            tickers,
            dates,
            prices,
        })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Rows in date order; each row is aligned with [`PriceHistory::tickers`].
    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.prices
    }

    pub fn n_assets(&self) -> usize {
        self.tickers.len()
    }

    pub fn n_periods(&self) -> usize {
        self.dates.len()
    }

    /// Number of non-missing observations for the asset at `index`.
    pub fn valid_count(&self, index: usize) -> usize {
        self.prices
            .iter()
            .filter(|row| row.get(index).copied().flatten().is_some())
            .count()
    }

    /// Last non-missing price per asset (forward fill to the final row).
    pub fn latest_prices(&self) -> Vec<Option<f64>> {
        (0..self.n_assets())
            .map(|i| self.prices.iter().rev().find_map(|row| row[i]))
            .collect()
    }

    /// Rows whose date falls inside `[start, end]`.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> PriceHistory {
        let (dates, prices): (Vec<NaiveDate>, Vec<Vec<Option<f64>>>) = self
            .dates
            .iter()
            .zip(self.prices.iter())
            .filter(|(d, _)| **d >= start && **d <= end)
            .map(|(d, row)| (*d, row.clone()))
            .unzip();
        PriceHistory {
            tickers: self.tickers.clone(),
            dates,
            prices,
        }
    }

    /// Keep only `tickers`, in the order given.
    pub fn select(&self, tickers: &[String]) -> PortfolioOptResult<PriceHistory> {
        validate_tickers(tickers)?;
        let indices = tickers
            .iter()
            .map(|t| {
                self.tickers
                    .iter()
                    .position(|own| own == t)
                    .ok_or_else(|| PortfolioOptError::InvalidInput {
                        field: "tickers".into(),
                        reason: format!("Ticker {} not present in price history", t),
                    })
            })
            .collect::<PortfolioOptResult<Vec<usize>>>()?;

        let prices = self
            .prices
            .iter()
            .map(|row| indices.iter().map(|&i| row[i]).collect())
            .collect();

        Ok(PriceHistory {
            tickers: tickers.to_vec(),
            dates: self.dates.clone(),
            prices,
        })
    }

    /// Same table with columns reordered alphabetically by ticker.
    pub fn sorted_by_ticker(&self) -> PriceHistory {
        let mut order: Vec<String> = self.tickers.clone();
        order.sort();
        // Tickers are unique, so selection by the sorted list cannot fail.
        match self.select(&order) {
            Ok(sorted) => sorted,
            Err(_) => self.clone(),
        }
    }
}

impl TryFrom<PriceHistoryData> for PriceHistory {
    type Error = PortfolioOptError;

    fn try_from(data: PriceHistoryData) -> Result<Self, Self::Error> {
        PriceHistory::new(data.tickers, data.dates, data.prices)
    }
}

impl From<PriceHistory> for PriceHistoryData {
    fn from(h: PriceHistory) -> Self {
        PriceHistoryData {
            tickers: h.tickers,
            dates: h.dates,
            prices: h.prices,
        }
    }
}

fn validate_tickers(tickers: &[String]) -> PortfolioOptResult<()> {
    let mut seen = HashSet::with_capacity(tickers.len());
    for t in tickers {
        if t.trim().is_empty() {
            return Err(PortfolioOptError::InvalidInput {
                field: "tickers".into(),
                reason: "Ticker symbols must be non-empty".into(),
            });
        }
        if !seen.insert(t.as_str()) {
            return Err(PortfolioOptError::InvalidInput {
                field: "tickers".into(),
                reason: format!("Duplicate ticker {}", t),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn sample() -> PriceHistory {
        PriceHistory::new(
            vec!["MSFT".into(), "AAPL".into()],
            vec![d(2), d(3), d(4), d(5)],
            vec![
                vec![Some(100.0), Some(50.0)],
                vec![Some(101.0), None],
                vec![None, Some(51.0)],
                vec![Some(103.0), None],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_latest_prices_forward_fill() {
        let h = sample();
        assert_eq!(h.latest_prices(), vec![Some(103.0), Some(51.0)]);
    }

    #[test]
    fn test_latest_price_missing_when_column_empty() {
        let h = PriceHistory::new(
            vec!["A".into(), "B".into()],
            vec![d(2), d(3)],
            vec![vec![Some(1.0), None], vec![Some(2.0), None]],
        )
        .unwrap();
        assert_eq!(h.latest_prices(), vec![Some(2.0), None]);
        assert_eq!(h.valid_count(1), 0);
    }

    #[test]
    fn test_duplicate_tickers_rejected() {
        let err = PriceHistory::new(
            vec!["A".into(), "A".into()],
            vec![d(2)],
            vec![vec![Some(1.0), Some(1.0)]],
        )
        .unwrap_err();
        assert!(matches!(err, PortfolioOptError::InvalidInput { .. }));
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let err = PriceHistory::new(vec!["A".into()], vec![d(2)], vec![vec![Some(0.0)]]).unwrap_err();
        assert!(err.to_string().contains("prices.A"));
    }

    #[test]
    fn test_unsorted_dates_rejected() {
        assert!(PriceHistory::new(
            vec!["A".into()],
            vec![d(3), d(2)],
            vec![vec![Some(1.0)], vec![Some(1.0)]],
        )
        .is_err());
    }

    #[test]
    fn test_window_and_sort() {
        let h = sample();
        let w = h.window(d(3), d(4));
        assert_eq!(w.n_periods(), 2);
        assert_eq!(w.dates(), &[d(3), d(4)]);

        let sorted = h.sorted_by_ticker();
        assert_eq!(sorted.tickers(), &["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(sorted.rows()[0], vec![Some(50.0), Some(100.0)]);
    }

    #[test]
    fn test_select_unknown_ticker() {
        let h = sample();
        assert!(h.select(&["GOOG".to_string()]).is_err());
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let json = r#"{"tickers":["A"],"dates":["2024-01-02","2024-01-03"],"prices":[[1.0],[null]]}"#;
        let h: PriceHistory = serde_json::from_str(json).unwrap();
        assert_eq!(h.valid_count(0), 1);

        let bad = r#"{"tickers":["A"],"dates":["2024-01-02"],"prices":[[-1.0]]}"#;
        assert!(serde_json::from_str::<PriceHistory>(bad).is_err());
    }
}
