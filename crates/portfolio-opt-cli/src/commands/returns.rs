use clap::Args;
use serde_json::Value;

use portfolio_opt_core::workflow::{summarize_returns, ReturnsReportInput};

use crate::input;

/// Arguments for the returns-model summary
#[derive(Args)]
pub struct ReturnsArgs {
    /// Price table CSV: header `date,<ticker>,...`
    #[arg(long)]
    pub prices: String,

    /// Comma-separated tickers to keep (default: every column)
    #[arg(long, value_delimiter = ',')]
    pub tickers: Option<Vec<String>>,

    /// Annualization factor
    #[arg(long, default_value = "252")]
    pub trading_days: f64,

    /// Keep tickers in file order instead of sorting them
    #[arg(long)]
    pub no_sort: bool,
}

pub fn run_returns(args: ReturnsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let history = input::prices::read_price_csv(&args.prices)?;
    let mut tickers = args.tickers.unwrap_or_else(|| history.tickers().to_vec());
    if !args.no_sort {
        tickers.sort();
    }
    let report = ReturnsReportInput {
        price_history: history.select(&tickers)?,
        trading_days: args.trading_days,
    };
    let result = summarize_returns(&report)?;
    Ok(serde_json::to_value(result)?)
}
