use chrono::NaiveDate;
use std::io::Read;

use portfolio_opt_core::providers::{RateObservation, RateSeries};

use super::{file, prices::parse_cell};

/// Read a `date,<series>` file such as a FRED download. The value column
/// header names the series.
pub fn read_rate_csv(path: &str, percent: bool) -> Result<RateSeries, Box<dyn std::error::Error>> {
    let (canonical, handle) = file::open(path)?;
    parse_rate_csv(handle, percent).map_err(|e| format!("{}: {}", canonical.display(), e).into())
}

pub fn parse_rate_csv<R: Read>(reader: R, percent: bool) -> Result<RateSeries, Box<dyn std::error::Error>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.len() != 2 {
        return Err("rate CSV needs exactly two columns: date,value".into());
    }
    let name = headers.get(1).unwrap_or("rate").to_string();

    let mut observations = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let date_field = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_field, "%Y-%m-%d")
            .map_err(|e| format!("row {}: bad date '{}': {}", line + 2, date_field, e))?;
        let value = parse_cell(record.get(1).unwrap_or_default())
            .map_err(|e| format!("row {}: {}", line + 2, e))?;
        observations.push(RateObservation { date, value });
    }
    Ok(RateSeries::new(name, observations, percent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use portfolio_opt_core::providers::RiskFreeRateProvider;

    #[test]
    fn test_fred_style_series() {
        let csv = "DATE,GS10\n2024-03-01,4.21\n2024-04-01,4.54\n2024-05-01,.\n";
        let series = parse_rate_csv(csv.as_bytes(), true).unwrap();
        assert_eq!(series.name, "GS10");
        let rate = series.latest_rate().unwrap();
        assert!((rate - 0.0454).abs() < 1e-12);
    }
}
