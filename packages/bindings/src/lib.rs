use napi::Result as NapiResult;
use napi_derive::napi;
use serde::de::DeserializeOwned;
use serde::Serialize;

use portfolio_opt_core::PortfolioOptResult;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Parse the JSON input, run `f`, serialize its output.
fn json_call<I, O>(input_json: &str, f: impl FnOnce(&I) -> PortfolioOptResult<O>) -> NapiResult<String>
where
    I: DeserializeOwned,
    O: Serialize,
{
    let input: I = serde_json::from_str(input_json).map_err(to_napi_error)?;
    let output = f(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[napi]
pub fn optimize_portfolio(input_json: String) -> NapiResult<String> {
    json_call(&input_json, portfolio_opt_core::workflow::optimize_portfolio)
}

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

#[napi]
pub fn estimate_returns(input_json: String) -> NapiResult<String> {
    json_call(&input_json, portfolio_opt_core::workflow::summarize_returns)
}

#[napi]
pub fn portfolio_metrics(input_json: String) -> NapiResult<String> {
    json_call(&input_json, portfolio_opt_core::workflow::evaluate_portfolio)
}

#[napi]
pub fn derive_allocation(input_json: String) -> NapiResult<String> {
    json_call(&input_json, portfolio_opt_core::allocation::allocate)
}

/// Default optimizer configuration as JSON, for callers building inputs.
#[napi]
pub fn default_config() -> NapiResult<String> {
    serde_json::to_string(&portfolio_opt_core::config::OptimizerConfig::default()).map_err(to_napi_error)
}
