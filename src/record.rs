//! JSONL record handling.
//!
//! Records stay as order-preserving JSON object maps end to end, so that
//! output files diff cleanly against their inputs: keys are written in
//! insertion order, and newly derived fields land directly after `label`.

use serde_json::{Map as JsonMap, Value};

pub type RecordMap = JsonMap<String, Value>;

/// Opaque time-series placeholder embedded in question text.
pub const TS_PLACEHOLDER: &str = "<ts><ts/>";

/// Number of time-series placeholders in `text`. Exactly 1 routes to the
/// univariate sink, 2 or more to the multivariate sink, 0 is unroutable.
pub fn count_ts_placeholders(text: &str) -> usize {
    text.matches(TS_PLACEHOLDER).count()
}

/// Parses one JSONL line into an order-preserving object map.
pub fn parse_line(line: &str) -> serde_json::Result<RecordMap> {
    serde_json::from_str(line.trim())
}

/// First required field missing from `record`, if any.
pub fn missing_field<'a>(record: &RecordMap, required: &[&'a str]) -> Option<&'a str> {
    required.iter().copied().find(|f| !record.contains_key(*f))
}

/// String value of `key`, when present and a string.
pub fn get_str<'a>(record: &'a RecordMap, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

/// The record's `id` rendered for diagnostics; "unknown" when absent.
pub fn display_id(record: &RecordMap) -> String {
    match record.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
        None => "unknown".to_string(),
    }
}

/// Rebuilds `record` with `new_fields` inserted directly after the `label`
/// key, preserving the order of everything else. When `label` is absent the
/// new fields are appended at the end.
pub fn insert_after_label(record: &RecordMap, new_fields: &[(String, Value)]) -> RecordMap {
    let mut out = JsonMap::with_capacity(record.len() + new_fields.len());
    let mut inserted = false;
    for (key, value) in record {
        out.insert(key.clone(), value.clone());
        if key == "label" && !inserted {
            for (k, v) in new_fields {
                out.insert(k.clone(), v.clone());
            }
            inserted = true;
        }
    }
    if !inserted {
        for (k, v) in new_fields {
            out.insert(k.clone(), v.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> RecordMap {
        let mut map = RecordMap::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.clone());
        }
        map
    }

    #[test]
    fn counts_placeholders() {
        assert_eq!(count_ts_placeholders("no markers here"), 0);
        assert_eq!(count_ts_placeholders("series: <ts><ts/>."), 1);
        assert_eq!(
            count_ts_placeholders("a <ts><ts/> and b <ts><ts/> and c <ts><ts/>"),
            3
        );
    }

    #[test]
    fn finds_missing_required_field() {
        let rec = record(&[("id", json!(1)), ("task", json!("x"))]);
        assert_eq!(missing_field(&rec, &["id", "task"]), None);
        assert_eq!(missing_field(&rec, &["id", "output"]), Some("output"));
    }

    #[test]
    fn inserts_new_fields_after_label() {
        let rec = record(&[
            ("id", json!(7)),
            ("label", json!("Yes")),
            ("timeseries", json!([1.0])),
        ]);
        let out = insert_after_label(&rec, &[("cot".to_string(), json!("<think></think>"))]);
        let keys: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "label", "cot", "timeseries"]);
    }

    #[test]
    fn appends_when_label_is_absent() {
        let rec = record(&[("id", json!(7))]);
        let out = insert_after_label(&rec, &[("cot".to_string(), json!("x"))]);
        let keys: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "cot"]);
    }

    #[test]
    fn parse_line_preserves_key_order() {
        let rec = parse_line(r#"{"id": 1, "zeta": 2, "alpha": 3}"#).unwrap();
        let keys: Vec<&str> = rec.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "zeta", "alpha"]);
    }
}
