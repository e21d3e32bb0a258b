//! Defensive rounding of `timeseries` payloads.
//!
//! Every pass that rewrites records carries a 4-decimal copy of the series
//! alongside the original precision. Rounding is recursive and shape
//! preserving; anything that is not a number (or a nested list of numbers)
//! is a typed error for that one record.

use serde_json::{json, Value};
use thiserror::Error;

/// A `timeseries` leaf that is not a JSON number.
#[derive(Debug, Error)]
#[error("non-numeric value in timeseries: {found}")]
pub struct NonNumericValue {
    pub found: String,
}

/// Returns a copy of `value` with every numeric leaf rounded to 4 decimal
/// digits. List nesting is preserved exactly; integers pass through
/// unchanged.
pub fn round_timeseries(value: &Value) -> Result<Value, NonNumericValue> {
    match value {
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(round_timeseries(item)?);
            }
            Ok(Value::Array(out))
        }
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(x) => Ok(json!(round4(x))),
            None => Err(NonNumericValue {
                found: n.to_string(),
            }),
        },
        other => Err(NonNumericValue {
            found: other.to_string(),
        }),
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
