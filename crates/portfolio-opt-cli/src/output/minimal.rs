use serde_json::Value;

use super::{asset_rows, format_scalar};

/// Print just the key answer.
///
/// Per-asset results print one `ticker value` line per asset (shares when
/// an allocation was made, otherwise the weight). Anything else falls back
/// to the first well-known scalar, then to the first field.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let Value::Object(map) = result_obj else {
        println!("{}", format_scalar(result_obj));
        return;
    };

    if let Some((_, rows)) = asset_rows(map) {
        for row in rows.iter().filter_map(Value::as_object) {
            let ticker = row.get("ticker").map(format_scalar).unwrap_or_default();
            let answer = ["shares", "weight", "annual_mean_return"]
                .iter()
                .find_map(|k| row.get(*k).filter(|v| !v.is_null()))
                .map(format_scalar)
                .unwrap_or_default();
            println!("{} {}", ticker, answer);
        }
        if let Some(cash) = map.get("remaining_cash").filter(|v| !v.is_null()) {
            println!("remaining_cash {}", format_scalar(cash));
        }
        return;
    }

    let priority_keys = ["sharpe_ratio", "remaining_cash", "volatility", "expected_return"];
    for key in &priority_keys {
        if let Some(val) = map.get(*key).filter(|v| !v.is_null()) {
            println!("{}", format_scalar(val));
            return;
        }
    }

    if let Some((key, val)) = map.iter().next() {
        println!("{}: {}", key, format_scalar(val));
    }
}
