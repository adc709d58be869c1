use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::RiskFreeRateProvider;
use crate::error::PortfolioOptError;
use crate::types::Rate;
use crate::PortfolioOptResult;

/// A rate known up front.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedRiskFreeRate(pub Rate);

impl RiskFreeRateProvider for FixedRiskFreeRate {
    fn latest_rate(&self) -> PortfolioOptResult<Rate> {
        if !self.0.is_finite() {
            return Err(PortfolioOptError::InvalidInput {
                field: "risk_free_rate".into(),
                reason: format!("Must be finite, got {}", self.0),
            });
        }
        Ok(self.0)
    }
}

/// One dated observation; `value` is `None` for a missing print.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateObservation {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// A dated yield series such as a 10-year Treasury constant maturity.
/// The latest non-missing observation is the rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSeries {
    pub name: String,
    pub observations: Vec<RateObservation>,
    /// Values are quoted in percent (4.5 for 4.5%) and get divided by 100.
    #[serde(default)]
    pub percent: bool,
}

impl RateSeries {
    pub fn new(name: impl Into<String>, observations: Vec<RateObservation>, percent: bool) -> Self {
        Self {
            name: name.into(),
            observations,
            percent,
        }
    }

    /// Latest observation that carries a value.
    pub fn latest(&self) -> Option<RateObservation> {
        self.observations
            .iter()
            .filter(|o| o.value.is_some())
            .max_by_key(|o| o.date)
            .copied()
    }
}

impl RiskFreeRateProvider for RateSeries {
    fn latest_rate(&self) -> PortfolioOptResult<Rate> {
        let latest = self.latest().ok_or_else(|| PortfolioOptError::InsufficientData {
            asset: self.name.clone(),
            reason: "series holds no valid observation".into(),
        })?;
        let raw = latest.value.unwrap_or_default();
        if !raw.is_finite() {
            return Err(PortfolioOptError::InvalidInput {
                field: self.name.clone(),
                reason: format!("Observation on {} is not finite", latest.date),
            });
        }
        let rate = if self.percent { raw / 100.0 } else { raw };
        tracing::debug!(series = %self.name, date = %latest.date, rate, "latest risk-free rate");
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn obs(d: u32, value: Option<f64>) -> RateObservation {
        RateObservation {
            date: NaiveDate::from_ymd_opt(2024, 5, d).unwrap(),
            value,
        }
    }

    #[test]
    fn test_percent_series_scaled() {
        let series = RateSeries::new("GS10", vec![obs(1, Some(4.61)), obs(2, Some(4.50))], true);
        assert_relative_eq!(series.latest_rate().unwrap(), 0.045, epsilon = 1e-15);
    }

    #[test]
    fn test_trailing_gap_skipped() {
        let series = RateSeries::new("GS10", vec![obs(1, Some(0.042)), obs(2, None)], false);
        assert_relative_eq!(series.latest_rate().unwrap(), 0.042);
    }

    #[test]
    fn test_unordered_observations() {
        let series = RateSeries::new("X", vec![obs(9, Some(0.05)), obs(3, Some(0.01))], false);
        assert_relative_eq!(series.latest_rate().unwrap(), 0.05);
    }

    #[test]
    fn test_empty_series() {
        let series = RateSeries::new("EMPTY", vec![obs(1, None)], false);
        assert!(matches!(
            series.latest_rate(),
            Err(PortfolioOptError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_fixed_rate() {
        assert_eq!(FixedRiskFreeRate(0.03).latest_rate().unwrap(), 0.03);
        assert!(FixedRiskFreeRate(f64::NAN).latest_rate().is_err());
    }
}
