pub mod config;
pub mod error;
pub mod objective;
pub mod optimizer;
pub mod returns_model;
pub mod snapping;
pub mod types;

#[cfg(feature = "allocation")]
pub mod allocation;

#[cfg(feature = "providers")]
pub mod providers;

#[cfg(feature = "workflow")]
pub mod workflow;

pub use error::PortfolioOptError;
pub use types::*;

/// Standard result type for all portfolio-opt operations
pub type PortfolioOptResult<T> = Result<T, PortfolioOptError>;
