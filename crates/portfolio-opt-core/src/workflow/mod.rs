pub mod pipeline;
pub mod reports;

pub use pipeline::{
    optimize_portfolio, AssetPosition, PortfolioOptimizationInput, PortfolioOptimizationOutput,
    SolverDiagnostics,
};
pub use reports::{evaluate_portfolio, summarize_returns, PortfolioMetricsInput, ReturnsReportInput};
