use chrono::NaiveDate;
use std::io::Read;

use portfolio_opt_core::returns_model::PriceHistory;

use super::file;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Read a `date,<ticker>,...` price table. Empty cells are gaps.
pub fn read_price_csv(path: &str) -> Result<PriceHistory, Box<dyn std::error::Error>> {
    let (canonical, handle) = file::open(path)?;
    parse_price_csv(handle).map_err(|e| format!("{}: {}", canonical.display(), e).into())
}

pub fn parse_price_csv<R: Read>(reader: R) -> Result<PriceHistory, Box<dyn std::error::Error>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err("price CSV needs a date column and at least one ticker column".into());
    }
    let tickers: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut rows: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let date_field = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_field, DATE_FORMAT)
            .map_err(|e| format!("row {}: bad date '{}': {}", line + 2, date_field, e))?;
        let prices = (1..headers.len())
            .map(|i| parse_cell(record.get(i).unwrap_or_default()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("row {}: {}", line + 2, e))?;
        rows.push((date, prices));
    }
    rows.sort_by_key(|(date, _)| *date);

    let (dates, prices): (Vec<NaiveDate>, Vec<Vec<Option<f64>>>) = rows.into_iter().unzip();
    tracing::debug!(tickers = tickers.len(), rows = dates.len(), "loaded price table");
    Ok(PriceHistory::new(tickers, dates, prices)?)
}

/// Empty, `NA`, `NaN`, `null` and `.` all mark a missing observation.
pub fn parse_cell(cell: &str) -> Result<Option<f64>, String> {
    let cell = cell.trim();
    if cell.is_empty()
        || cell == "."
        || cell.eq_ignore_ascii_case("na")
        || cell.eq_ignore_ascii_case("nan")
        || cell.eq_ignore_ascii_case("null")
    {
        return Ok(None);
    }
    cell.parse::<f64>()
        .map(Some)
        .map_err(|e| format!("bad number '{}': {}", cell, e))
}
