use chrono::NaiveDate;

use super::PriceHistoryProvider;
use crate::error::PortfolioOptError;
use crate::returns_model::PriceHistory;
use crate::PortfolioOptResult;

/// Serves windows and column subsets of a price table held in memory.
#[derive(Debug, Clone)]
pub struct StaticPriceHistory {
    history: PriceHistory,
}

impl StaticPriceHistory {
    pub fn new(history: PriceHistory) -> Self {
        Self { history }
    }

    pub fn history(&self) -> &PriceHistory {
        &self.history
    }
}

impl PriceHistoryProvider for StaticPriceHistory {
    fn fetch(&self, tickers: &[String], start: NaiveDate, end: NaiveDate) -> PortfolioOptResult<PriceHistory> {
        if start > end {
            return Err(PortfolioOptError::InvalidInput {
                field: "start".into(),
                reason: format!("Window start {} is after end {}", start, end),
            });
        }
        let window = self.history.select(tickers)?.window(start, end);
        tracing::debug!(
            tickers = tickers.len(),
            rows = window.n_periods(),
            %start,
            %end,
            "served price window"
        );
        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn provider() -> StaticPriceHistory {
        let history = PriceHistory::new(
            vec!["MSFT".into(), "AAPL".into(), "GOOG".into()],
            vec![day(1), day(4), day(5), day(6)],
            vec![
                vec![Some(400.0), Some(180.0), Some(140.0)],
                vec![Some(405.0), None, Some(141.0)],
                vec![Some(402.0), Some(182.0), Some(139.5)],
                vec![Some(410.0), Some(181.0), Some(142.0)],
            ],
        )
        .unwrap();
        StaticPriceHistory::new(history)
    }

    #[test]
    fn test_fetch_selects_columns_in_request_order() {
        let h = provider()
            .fetch(&["GOOG".into(), "MSFT".into()], day(1), day(6))
            .unwrap();
        assert_eq!(h.tickers(), &["GOOG".to_string(), "MSFT".to_string()]);
        assert_eq!(h.rows()[0], vec![Some(140.0), Some(400.0)]);
    }

    #[test]
    fn test_fetch_window_is_inclusive() {
        let h = provider().fetch(&["AAPL".into()], day(4), day(5)).unwrap();
        assert_eq!(h.dates(), &[day(4), day(5)]);
        assert_eq!(h.rows()[0], vec![None]);
    }

    #[test]
    fn test_unknown_ticker() {
        assert!(provider().fetch(&["TSLA".into()], day(1), day(6)).is_err());
    }

    #[test]
    fn test_inverted_window() {
        assert!(provider().fetch(&["MSFT".into()], day(6), day(1)).is_err());
    }
}
