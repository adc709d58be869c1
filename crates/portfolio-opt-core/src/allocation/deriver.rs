use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::OptimizerConfig;
use crate::error::PortfolioOptError;
use crate::snapping::{snap_amount, snap_weights};
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::PortfolioOptResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Cash and share count for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAllocation {
    pub ticker: String,
    /// Weight after snapping.
    pub weight: f64,
    /// Latest price used for the share count.
    pub price: Decimal,
    pub cash: Money,
    /// Fractional share count, `cash / price`.
    pub shares: Decimal,
}

/// Per-asset allocation plus the cash left over.
///
/// `Σ cash + remaining_cash == investment_amount` holds exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub allocations: Vec<AssetAllocation>,
    pub investment_amount: Money,
    pub allocated: Money,
    pub remaining_cash: Money,
}

/// Standalone allocation request (weights computed elsewhere).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationInput {
    pub tickers: Vec<String>,
    pub weights: Vec<f64>,
    pub investment_amount: Money,
    /// Latest observed price per asset; `None` when the asset never traded.
    pub latest_prices: Vec<Option<f64>>,
    #[serde(default)]
    pub config: OptimizerConfig,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Turn weights into cash amounts and share counts.
///
/// - `cash_i = w_i * A`, zeroed below `allocation_threshold`
/// - `shares_i = cash_i / price_i`, zeroed below `allocation_threshold`
/// - `remaining = A - Σ cash_i`
///
/// Weights are snapped with `weight_threshold` first, so a vector that did
/// not come from the optimizer obeys the same rule.
pub fn derive_allocation(
    tickers: &[String],
    weights: &[f64],
    investment_amount: Money,
    latest_prices: &[Option<f64>],
    config: &OptimizerConfig,
) -> PortfolioOptResult<AllocationResult> {
    let n = tickers.len();
    if weights.len() != n || latest_prices.len() != n {
        return Err(PortfolioOptError::InvalidInput {
            field: "weights".into(),
            reason: format!(
                "{} tickers, {} weights and {} prices must align",
                n,
                weights.len(),
                latest_prices.len()
            ),
        });
    }
    if investment_amount <= Decimal::ZERO {
        return Err(PortfolioOptError::InvalidInput {
            field: "investment_amount".into(),
            reason: "Must be positive".into(),
        });
    }
    if let Some(i) = weights.iter().position(|w| !w.is_finite()) {
        return Err(PortfolioOptError::InvalidInput {
            field: format!("weights.{}", tickers[i]),
            reason: "Weight must be finite".into(),
        });
    }
    let threshold = to_decimal("allocation_threshold", config.allocation_threshold)?;

    let weights = snap_weights(weights, config.weight_threshold);
    let mut allocations = Vec::with_capacity(n);
    let mut allocated = Decimal::ZERO;

    for ((ticker, &weight), price) in tickers.iter().zip(weights.iter()).zip(latest_prices) {
        let price_field = format!("latest_prices.{}", ticker);
        let price = match price {
            Some(p) if p.is_finite() && *p > 0.0 => to_decimal(&price_field, *p)?,
            Some(p) => {
                return Err(PortfolioOptError::InvalidInput {
                    field: price_field,
                    reason: format!("Price must be positive, got {}", p),
                })
            }
            None => {
                return Err(PortfolioOptError::MissingPrice {
                    asset: ticker.clone(),
                })
            }
        };
        // Prices below decimal precision round to zero.
        if price <= Decimal::ZERO {
            return Err(PortfolioOptError::InvalidInput {
                field: price_field,
                reason: "Price is below decimal precision".into(),
            });
        }

        let weight_field = format!("weights.{}", ticker);
        let raw_cash = to_decimal(&weight_field, weight)?
            .checked_mul(investment_amount)
            .ok_or_else(|| PortfolioOptError::InvalidInput {
                field: weight_field,
                reason: "Cash amount overflows".into(),
            })?;
        let cash = snap_amount(raw_cash, threshold);
        let shares = cash
            .checked_div(price)
            .ok_or_else(|| PortfolioOptError::InvalidInput {
                field: price_field.clone(),
                reason: format!("Share count for {} at {} overflows", cash, price),
            })?;
        let shares = snap_amount(shares, threshold);
        allocated += cash;
        allocations.push(AssetAllocation {
            ticker: ticker.clone(),
            weight,
            price,
            cash,
            shares,
        });
    }

    let remaining_cash = investment_amount - allocated;
    tracing::debug!(%investment_amount, %allocated, %remaining_cash, "derived allocation");

    Ok(AllocationResult {
        allocations,
        investment_amount,
        allocated,
        remaining_cash,
    })
}

/// [`derive_allocation`] wrapped in the standard output envelope.
pub fn allocate(input: &AllocationInput) -> PortfolioOptResult<ComputationOutput<AllocationResult>> {
    let start = Instant::now();
    input.config.validate()?;
    let result = derive_allocation(
        &input.tickers,
        &input.weights,
        input.investment_amount,
        &input.latest_prices,
        &input.config,
    )?;

    let mut warnings = Vec::new();
    for (a, raw) in result.allocations.iter().zip(&input.weights) {
        if a.weight == 0.0 && *raw != 0.0 {
            warnings.push(format!(
                "{}: weight {:.6} below threshold {}, allocated nothing",
                a.ticker, raw, input.config.weight_threshold
            ));
        }
    }
    if result.remaining_cash > Decimal::ZERO {
        warnings.push(format!("{} left unallocated", result.remaining_cash));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Weight-proportional cash split with fractional shares at the latest price",
        &serde_json::json!({
            "weight_threshold": input.config.weight_threshold,
            "allocation_threshold": input.config.allocation_threshold,
            "renormalized_after_snapping": false,
        }),
        warnings,
        elapsed,
        result,
    ))
}

fn to_decimal(field: &str, value: f64) -> PortfolioOptResult<Decimal> {
    Decimal::try_from(value).map_err(|_| PortfolioOptError::InvalidInput {
        field: field.into(),
        reason: format!("{} is not representable as a decimal", value),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
