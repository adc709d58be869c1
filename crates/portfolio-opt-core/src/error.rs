use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortfolioOptError {
    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data for {asset}: {reason}")]
    InsufficientData { asset: String, reason: String },

    #[error("Infeasible constraints: {0}")]
    InfeasibleConstraints(String),

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: f64,
    },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Missing price for {asset}: no valid price observed")]
    MissingPrice { asset: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for PortfolioOptError {
    fn from(e: serde_json::Error) -> Self {
        PortfolioOptError::SerializationError(e.to_string())
    }
}
