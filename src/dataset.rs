//! Parser for the multi-series `.ts` dataset format.
//!
//! Layout: `@key value` metadata lines, a case-insensitive `@data` sentinel,
//! then one example per line as `var1_csv:var2_csv:...:varN_csv:label`. The
//! variable count is inferred from the first valid data line and enforced
//! afterwards; individual bad lines are skipped with a diagnostic and never
//! abort the pass.

use log::{info, warn};
use serde_json::{json, Map as JsonMap, Value};

/// One parsed example: its raw label and one numeric series per variable.
#[derive(Debug, Clone, PartialEq)]
pub struct TsRecord {
    pub label: String,
    pub series: Vec<Vec<f64>>,
}

/// Parse result: metadata (augmented with the inferred `variableCount` and
/// `singleSeriesLength`) plus all valid records in input order.
#[derive(Debug, Default)]
pub struct TsDataset {
    pub metadata: JsonMap<String, Value>,
    pub records: Vec<TsRecord>,
    pub skipped_lines: usize,
}

pub fn parse_ts(text: &str) -> TsDataset {
    let mut dataset = TsDataset::default();
    let mut series_len: usize = 0;
    let mut var_count: Option<usize> = None;
    let mut in_data = false;

    for (line_no, raw) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if !in_data {
            if line.eq_ignore_ascii_case("@data") {
                in_data = true;
            } else if let Some(meta) = line.strip_prefix('@') {
                if let Some((key, val)) = meta.split_once(' ') {
                    let val = val.trim();
                    dataset
                        .metadata
                        .insert(key.to_string(), Value::String(val.to_string()));
                    if key == "seriesLength" {
                        match val.parse::<usize>() {
                            Ok(n) => series_len = n,
                            Err(_) => warn!("line {line_no}: unparsable @seriesLength {val:?}"),
                        }
                    }
                }
            }
            continue;
        }

        // Data line: everything before the last colon is variable data,
        // everything after it is the label.
        let Some((all_vars, label)) = line.rsplit_once(':') else {
            warn!("line {line_no}: no colon, skipping");
            dataset.skipped_lines += 1;
            continue;
        };
        let label = label.trim();
        if label.is_empty() {
            warn!("line {line_no}: empty label, skipping");
            dataset.skipped_lines += 1;
            continue;
        }

        let var_strs: Vec<&str> = all_vars.split(':').collect();
        match var_count {
            None => {
                var_count = Some(var_strs.len());
                info!(
                    "inferred variable count {} from line {line_no}",
                    var_strs.len()
                );
            }
            Some(expected) if var_strs.len() != expected => {
                warn!(
                    "line {line_no}: variable count mismatch (expected {expected}, got {}), skipping",
                    var_strs.len()
                );
                dataset.skipped_lines += 1;
                continue;
            }
            Some(_) => {}
        }

        match parse_series(&var_strs, series_len) {
            Ok(series) => dataset.records.push(TsRecord {
                label: label.to_string(),
                series,
            }),
            Err(reason) => {
                warn!("line {line_no}: {reason}, skipping");
                dataset.skipped_lines += 1;
            }
        }
    }

    if let Some(n) = var_count {
        dataset.metadata.insert("variableCount".to_string(), json!(n));
    }
    if series_len > 0 {
        dataset
            .metadata
            .insert("singleSeriesLength".to_string(), json!(series_len));
    }
    dataset
}

fn parse_series(var_strs: &[&str], series_len: usize) -> Result<Vec<Vec<f64>>, String> {
    let mut series = Vec::with_capacity(var_strs.len());
    for (var_idx, var_str) in var_strs.iter().enumerate() {
        let points: Vec<&str> = var_str
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if series_len > 0 && points.len() != series_len {
            return Err(format!(
                "variable {} has {} points, expected {series_len}",
                var_idx + 1,
                points.len()
            ));
        }
        let mut values = Vec::with_capacity(points.len());
        for point in points {
            let v: f64 = point
                .parse()
                .map_err(|e| format!("variable {}: {e} at {point:?}", var_idx + 1))?;
            values.push(v);
        }
        series.push(values);
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# a comment
@problemName TEE
@seriesLength 3
@data
1.0,2.0,3.0:4.0,5.0,6.0:0
0.5,0.25,0.125:7.0,8.0,9.0:1
";

    #[test]
    fn parses_metadata_and_records() {
        let ds = parse_ts(SAMPLE);
        assert_eq!(ds.metadata["problemName"], "TEE");
        assert_eq!(ds.metadata["seriesLength"], "3");
        assert_eq!(ds.metadata["variableCount"], 2);
        assert_eq!(ds.metadata["singleSeriesLength"], 3);
        assert_eq!(ds.records.len(), 2);
        assert_eq!(ds.records[0].label, "0");
        assert_eq!(ds.records[0].series, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    #[test]
    fn variable_count_mismatch_skips_line_only() {
        let text = "\
@data
1.0,2.0:3.0,4.0:a
5.0,6.0:b
7.0,8.0:9.0,10.0:c
";
        let ds = parse_ts(text);
        assert_eq!(ds.records.len(), 2);
        assert_eq!(ds.skipped_lines, 1);
        // The inferred count survives the bad line.
        assert_eq!(ds.metadata["variableCount"], 2);
        assert_eq!(ds.records[1].label, "c");
    }

    #[test]
    fn series_length_violation_skips_line() {
        let text = "\
@seriesLength 3
@data
1.0,2.0,3.0:a
1.0,2.0:b
";
        let ds = parse_ts(text);
        assert_eq!(ds.records.len(), 1);
        assert_eq!(ds.skipped_lines, 1);
    }

    #[test]
    fn non_numeric_point_skips_whole_line() {
        let text = "\
@data
1.0,oops,3.0:a
4.0,5.0,6.0:b
";
        let ds = parse_ts(text);
        assert_eq!(ds.records.len(), 1);
        assert_eq!(ds.records[0].label, "b");
        assert_eq!(ds.skipped_lines, 1);
    }

    #[test]
    fn empty_label_skips_line() {
        let text = "\
@data
1.0,2.0:
3.0,4.0:ok
";
        let ds = parse_ts(text);
        assert_eq!(ds.records.len(), 1);
        assert_eq!(ds.skipped_lines, 1);
    }

    #[test]
    fn sentinel_is_case_insensitive_and_required() {
        let ds = parse_ts("@DATA\n1.0:x\n");
        assert_eq!(ds.records.len(), 1);

        let ds = parse_ts("1.0:x\n");
        assert!(ds.records.is_empty());
    }
}
