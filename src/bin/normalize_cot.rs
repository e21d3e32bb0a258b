/*
cargo run --bin normalize_cot -- \
    output/univariate_labeled_cot.jsonl \
    --match-out output/univariate_cot_correct.jsonl \
    --mismatch-out output/univariate_cot_wrong.jsonl
*/

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use serde_json::Value;

use ts_curate::cot::{generate_cot_field, labels_match, CotParser};
use ts_curate::record::{self, RecordMap};
use ts_curate::{logging, sink::JsonlSink};

const REQUIRED_FIELDS: [&str; 6] = ["id", "task", "output", "timeseries", "cot_deepseekr1", "label"];

/// Parse chain-of-thought traces into per-step judgments, build the
/// normalized <think>/<ANSWER> field, and route records by whether the
/// final judgment agrees with the ground-truth label.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input JSONL file (labeled records with reasoning traces)
    input: PathBuf,

    /// Destination for records whose final judgment matches the label
    #[arg(long = "match-out", value_name = "PATH")]
    match_out: PathBuf,

    /// Destination for records whose final judgment does not match
    #[arg(long = "mismatch-out", value_name = "PATH")]
    mismatch_out: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = logging::init("normalize_cot")?;

    let file =
        File::open(&cli.input).with_context(|| format!("opening {}", cli.input.display()))?;
    let reader = BufReader::new(file);

    let mut matched = JsonlSink::create(&cli.match_out)?;
    let mut mismatched = JsonlSink::create(&cli.mismatch_out)?;
    let parser = CotParser::new();

    let mut total = 0usize;
    let mut failed_ids: Vec<String> = Vec::new();
    let mut empty_label_ids: Vec<String> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", cli.input.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        total += 1;

        let data: RecordMap = match record::parse_line(&line) {
            Ok(map) => map,
            Err(e) => {
                println!("line {line_no}: invalid JSON, skipping");
                warn!("line {line_no}: json parse error: {e}");
                failed_ids.push(format!("line {line_no}"));
                continue;
            }
        };
        let id = record::display_id(&data);

        if let Some(missing) = record::missing_field(&data, &REQUIRED_FIELDS) {
            println!("ID {id}: missing field {missing}, skipping");
            warn!("id {id}: missing required field {missing}");
            failed_ids.push(id);
            continue;
        }
        let cot_content = record::get_str(&data, "cot_deepseekr1").unwrap_or_default();
        let label = record::get_str(&data, "label").unwrap_or_default().to_string();

        let steps = parser.parse(cot_content);
        for (field, value) in steps.fields() {
            if value.is_none() {
                println!("ID {id}: {field} is empty");
                warn!("id {id}: {field} empty or missing");
                empty_label_ids.push(id.clone());
            }
        }

        let step6 = steps.step6.as_deref().unwrap_or("unknown");
        let cot_field = generate_cot_field(cot_content, steps.step6.as_deref());

        let mut new_fields: Vec<(String, Value)> = steps
            .fields()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null),
                )
            })
            .collect();
        new_fields.push(("cot".to_string(), Value::String(cot_field)));
        let enriched = record::insert_after_label(&data, &new_fields);

        if labels_match(&label, step6) {
            matched.write(&enriched)?;
            println!("ID {id}: judgment matches | step6: {step6} | label: {label}");
        } else {
            mismatched.write(&enriched)?;
            println!("ID {id}: judgment differs | step6: {step6} | label: {label}");
        }
    }

    let match_written = matched.written();
    let mismatch_written = mismatched.written();
    matched.finish()?;
    mismatched.finish()?;

    println!("\n=== Normalization summary ===");
    println!("Records read    : {total}");
    println!("Matched         : {match_written} -> {}", cli.match_out.display());
    println!("Mismatched      : {mismatch_written} -> {}", cli.mismatch_out.display());
    println!("Failed          : {} (IDs: {failed_ids:?})", failed_ids.len());
    println!("Empty step labels: {} (IDs: {empty_label_ids:?})", empty_label_ids.len());
    println!("Log file        : {}", log_path.display());
    Ok(())
}
