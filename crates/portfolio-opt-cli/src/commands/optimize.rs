use chrono::{Days, NaiveDate};
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use portfolio_opt_core::config::OptimizerConfig;
use portfolio_opt_core::providers::{
    FixedRiskFreeRate, PriceHistoryProvider, RiskFreeRateProvider, StaticPriceHistory,
};
use portfolio_opt_core::workflow::{optimize_portfolio, PortfolioOptimizationInput};

use crate::input;

/// Arguments for the full optimization pipeline
#[derive(Args)]
pub struct OptimizeArgs {
    /// JSON file holding a complete optimization input (price_history,
    /// risk_free_rate, investment_amount, config). Read from stdin when piped.
    #[arg(long, conflicts_with = "prices")]
    pub input: Option<String>,

    /// Price table CSV: header `date,<ticker>,...`, empty cells are gaps
    #[arg(long)]
    pub prices: Option<String>,

    /// Comma-separated tickers to use (default: every column)
    #[arg(long, value_delimiter = ',')]
    pub tickers: Option<Vec<String>>,

    /// Years of history ending at --end
    #[arg(long)]
    pub years: Option<u32>,

    /// Last date of the window, YYYY-MM-DD (default: last row of the table)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Annual risk-free rate as a decimal (0.045 = 4.5%)
    #[arg(long, allow_hyphen_values = true, conflicts_with = "risk_free_series")]
    pub risk_free_rate: Option<f64>,

    /// CSV `date,value` yield series; the latest observation is used
    #[arg(long)]
    pub risk_free_series: Option<String>,

    /// Series values are quoted in percent
    #[arg(long, requires = "risk_free_series")]
    pub percent: bool,

    /// Amount to allocate across the assets
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Optimizer config file (.json, .yaml or .yml)
    #[arg(long)]
    pub config: Option<String>,

    /// Per-asset weight cap (overrides config)
    #[arg(long)]
    pub upper_bound: Option<f64>,

    /// Per-asset weight floor (overrides config)
    #[arg(long, allow_hyphen_values = true)]
    pub lower_bound: Option<f64>,

    /// SQP iteration cap (overrides config)
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Fail instead of warning when the solver does not converge
    #[arg(long)]
    pub strict: bool,

    /// Keep tickers in file order instead of sorting them
    #[arg(long)]
    pub no_sort: bool,
}

pub fn run_optimize(args: OptimizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut opt_input: PortfolioOptimizationInput = match args.prices {
        Some(ref path) => build_input(&args, path)?,
        None => input::stdin::read_input(args.input.as_deref(), "optimize (or pass --prices)")?,
    };
    apply_overrides(&mut opt_input.config, &args);

    let result = optimize_portfolio(&opt_input)?;
    Ok(serde_json::to_value(result)?)
}

fn build_input(args: &OptimizeArgs, prices_path: &str) -> Result<PortfolioOptimizationInput, Box<dyn std::error::Error>> {
    let history = input::prices::read_price_csv(prices_path)?;
    let last_date = history
        .dates()
        .last()
        .copied()
        .ok_or("price table has no rows")?;
    let first_date = history.dates().first().copied().unwrap_or(last_date);

    let tickers = select_tickers(history.tickers(), args.tickers.as_deref(), !args.no_sort);
    let (start, end) = history_window(first_date, last_date, args.end, args.years)?;

    let provider = StaticPriceHistory::new(history);
    let price_history = provider.fetch(&tickers, start, end)?;

    let risk_free_rate = match (&args.risk_free_series, args.risk_free_rate) {
        (Some(path), _) => input::rates::read_rate_csv(path, args.percent)?.latest_rate()?,
        (None, Some(rate)) => FixedRiskFreeRate(rate).latest_rate()?,
        (None, None) => return Err("--risk-free-rate or --risk-free-series required".into()),
    };
    tracing::info!(risk_free_rate, %start, %end, assets = tickers.len(), "optimization inputs ready");

    Ok(PortfolioOptimizationInput {
        price_history,
        risk_free_rate,
        investment_amount: args.amount,
        config: input::config::load_config(args.config.as_deref())?,
    })
}

/// Requested tickers (or every column), sorted alphabetically unless `sort` is off.
fn select_tickers(available: &[String], requested: Option<&[String]>, sort: bool) -> Vec<String> {
    let mut tickers = requested.unwrap_or(available).to_vec();
    if sort {
        tickers.sort();
    }
    tickers
}

/// Inclusive `(start, end)` dates of the history to load.
///
/// `end` defaults to the last row. With `years = N` the window is the
/// half-open `(end - N*365 days, end]`, otherwise it starts at the first row.
fn history_window(
    first_date: NaiveDate,
    last_date: NaiveDate,
    end: Option<NaiveDate>,
    years: Option<u32>,
) -> Result<(NaiveDate, NaiveDate), String> {
    let end = end.unwrap_or(last_date);
    let start = match years {
        Some(years) => end
            .checked_sub_days(Days::new(u64::from(years) * 365))
            .and_then(|d| d.succ_opt())
            .ok_or("--years reaches before the supported date range")?,
        None => first_date,
    };
    Ok((start, end))
}

fn apply_overrides(config: &mut OptimizerConfig, args: &OptimizeArgs) {
    if let Some(upper) = args.upper_bound {
        config.upper_bound = upper;
    }
    if let Some(lower) = args.lower_bound {
        config.lower_bound = lower;
    }
    if let Some(iterations) = args.max_iterations {
        config.max_iterations = iterations;
    }
    if args.strict {
        config.require_convergence = true;
    }
}
