use clap::Args;
use serde_json::Value;

use portfolio_opt_core::workflow::{evaluate_portfolio, PortfolioMetricsInput};

use crate::input;

#[derive(Args)]
pub struct MetricsArgs {
    /// JSON with price_history, weights, risk_free_rate and optional trading_days
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_metrics(args: MetricsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let metrics_input: PortfolioMetricsInput =
        input::stdin::read_input(args.input.as_deref(), "portfolio metrics")?;
    let result = evaluate_portfolio(&metrics_input)?;
    Ok(serde_json::to_value(result)?)
}
