use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{asset_rows, format_scalar, ROW_KEYS};

/// Per-asset rows as one table, remaining result fields as a
/// Field/Value table, then warnings and methodology.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => print_result(result, map),
            _ => print_fields(map),
        },
        Value::Array(arr) => print_rows(arr),
        _ => println!("{}", value),
    }
}

fn print_result(result: &Map<String, Value>, envelope: &Map<String, Value>) {
    if let Some((_, rows)) = asset_rows(result) {
        print_rows(rows);
        println!();
    }

    let mut flat = Vec::new();
    for (key, val) in result {
        if ROW_KEYS.contains(&key.as_str()) && val.is_array() {
            continue;
        }
        flatten(key, val, &mut flat);
    }
    if !flat.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in flat {
            builder.push_record([key, val]);
        }
        println!("{}", Table::from(builder));
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// `metrics.sharpe_ratio`-style keys for nested objects.
fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                flatten(&format!("{}.{}", prefix, key), val, out);
            }
        }
        Value::Array(items) if items.iter().all(|v| v.is_array()) && !items.is_empty() => {
            // matrices: one line per row
            for (i, row) in items.iter().enumerate() {
                out.push((format!("{}[{}]", prefix, i), format_scalar(row)));
            }
        }
        _ => out.push((prefix.to_string(), format_scalar(value))),
    }
}

fn print_fields(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_scalar(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_rows(arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            println!("{}", format_scalar(item));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for map in arr.iter().filter_map(Value::as_object) {
        let row: Vec<String> = headers
            .iter()
            .map(|h| map.get(h.as_str()).map(format_scalar).unwrap_or_default())
            .collect();
        builder.push_record(row);
    }
    println!("{}", Table::from(builder));
}
