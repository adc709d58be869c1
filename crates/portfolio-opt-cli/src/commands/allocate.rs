use clap::Args;
use serde_json::Value;

use portfolio_opt_core::allocation::{self, AllocationInput};

use crate::input;

#[derive(Args)]
pub struct AllocateArgs {
    /// JSON with tickers, weights, investment_amount, latest_prices and optional config
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_allocate(args: AllocateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let alloc_input: AllocationInput = input::stdin::read_input(args.input.as_deref(), "allocation")?;
    let result = allocation::allocate(&alloc_input)?;
    Ok(serde_json::to_value(result)?)
}
