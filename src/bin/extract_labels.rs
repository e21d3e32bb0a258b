/*
cargo run --bin extract_labels -- \
    output/univariate_classified.jsonl \
    output/univariate_labeled.jsonl \
    --start-index 0 \
    --end-index 1300
*/

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use serde_json::Value;

use ts_curate::classify::TaskCategory;
use ts_curate::extract::{needs_review, LabelExtractor};
use ts_curate::record::{self, RecordMap};
use ts_curate::rounding::round_timeseries;
use ts_curate::{logging, sink::JsonlSink};

const REQUIRED_FIELDS: [&str; 4] = ["id", "task", "output", "timeseries"];

/// Extract normalized answer labels from free-text outputs, one rule set
/// per task category, and attach a 4-decimal copy of the series.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input JSONL file (classified records)
    input: PathBuf,

    /// Output JSONL file (truncated at start)
    output: PathBuf,

    /// First line index to process (inclusive, 0-based)
    #[arg(long = "start-index", default_value_t = 0)]
    start_index: usize,

    /// Last line index to process (inclusive); all lines when omitted
    #[arg(long = "end-index")]
    end_index: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = logging::init("extract_labels")?;

    let file =
        File::open(&cli.input).with_context(|| format!("opening {}", cli.input.display()))?;
    let reader = BufReader::new(file);

    let mut out = JsonlSink::create(&cli.output)?;
    let extractor = LabelExtractor::new();

    let mut total = 0usize;
    let mut failed_ids: Vec<String> = Vec::new();
    let mut review_ids: Vec<String> = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        if idx < cli.start_index {
            continue;
        }
        if let Some(end) = cli.end_index {
            if idx > end {
                break;
            }
        }
        let line = line.with_context(|| format!("reading {}", cli.input.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        total += 1;

        let data: RecordMap = match record::parse_line(&line) {
            Ok(map) => map,
            Err(e) => {
                println!("ID {idx}: invalid JSON, skipping");
                warn!("line {idx}: json parse error: {e}");
                failed_ids.push(idx.to_string());
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
        let Some(task) = record::get_str(&data, "task").and_then(TaskCategory::from_task_name)
        else {
            println!("ID {id}: unknown task type, skipping");
            warn!("id {id}: unknown task {:?}", record::get_str(&data, "task"));
            failed_ids.push(id);
            continue;
        };
        let output = record::get_str(&data, "output").unwrap_or_default();

        let label = extractor.extract(task, output);
        if needs_review(task, label.as_deref()) {
            println!("ID {id}: label {label:?} flagged for review");
            warn!("id {id}: task {} label {label:?} needs review", task.task_name());
            review_ids.push(id.clone());
        }

        // presence verified by the required-field check above
        let Some(ts_value) = data.get("timeseries") else {
            continue;
        };
        let rounded = match round_timeseries(ts_value) {
            Ok(v) => v,
            Err(e) => {
                println!("ID {id}: {e}, skipping");
                warn!("id {id}: {e}");
                failed_ids.push(id);
                continue;
            }
        };

        let mut enriched = record::insert_after_label(
            &data,
            &[("timeseries_rounded".to_string(), rounded)],
        );
        enriched.insert(
            "label".to_string(),
            Value::String(label.clone().unwrap_or_default()),
        );

        out.write(&enriched)?;
        println!("ID {id}: task {}, label {:?}", task.task_name(), label.unwrap_or_default());
    }

    let written = out.written();
    out.finish()?;

    println!("\n=== Extraction summary ===");
    println!("Records read : {total}");
    println!("Written      : {written}");
    println!("Failed       : {} (IDs: {failed_ids:?})", failed_ids.len());
    println!("For review   : {} (IDs: {review_ids:?})", review_ids.len());
    println!("Log file     : {}", log_path.display());
    Ok(())
}
