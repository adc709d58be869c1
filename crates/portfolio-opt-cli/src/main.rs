mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::allocate::AllocateArgs;
use commands::metrics::MetricsArgs;
use commands::optimize::OptimizeArgs;
use commands::returns::ReturnsArgs;

/// Max-Sharpe portfolio optimization
#[derive(Parser)]
#[command(
    name = "popt",
    version,
    about = "Max-Sharpe portfolio optimization",
    long_about = "Estimates log-returns and an annualized covariance matrix from a price \
                  table, solves for the weights that maximize the Sharpe ratio under \
                  full-investment and per-asset bounds, and splits an investment amount \
                  into cash and share counts."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log solver progress to stderr (same as RUST_LOG=debug)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: returns model, max-Sharpe solve, allocation
    Optimize(OptimizeArgs),
    /// Annualized mean returns, volatilities and covariance of a price table
    Returns(ReturnsArgs),
    /// Return, volatility and Sharpe ratio of a given weight vector
    Metrics(MetricsArgs),
    /// Cash and share counts for given weights, amount and prices
    Allocate(AllocateArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Optimize(args) => commands::optimize::run_optimize(args),
        Commands::Returns(args) => commands::returns::run_returns(args),
        Commands::Metrics(args) => commands::metrics::run_metrics(args),
        Commands::Allocate(args) => commands::allocate::run_allocate(args),
        Commands::Version => {
            println!("popt {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
