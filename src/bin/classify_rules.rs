/*
cargo run --bin classify_rules -- \
    data/sft/chatts_sft_train.jsonl \
    --univariate-out output/univariate_rule_based.jsonl \
    --multivariate-out output/multivariate_rule_based.jsonl \
    --start-index 0 \
    --end-index 50000
*/

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use serde_json::{json, Value};

use ts_curate::classify::{RuleClassifier, TaskCategory};
use ts_curate::record::{self, RecordMap};
use ts_curate::{logging, sink::JsonlSink};

/// Classify questions with the deterministic keyword rules and route
/// records by time-series placeholder count.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input JSONL file
    input: PathBuf,

    #[arg(long = "univariate-out", value_name = "PATH")]
    univariate_out: PathBuf,

    #[arg(long = "multivariate-out", value_name = "PATH")]
    multivariate_out: PathBuf,

    /// First line index to process (inclusive, 0-based)
    #[arg(long = "start-index", default_value_t = 0)]
    start_index: usize,

    /// Last line index to process (inclusive); all lines when omitted
    #[arg(long = "end-index")]
    end_index: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = logging::init("classify_rules")?;

    let file =
        File::open(&cli.input).with_context(|| format!("opening {}", cli.input.display()))?;
    let reader = BufReader::new(file);

    let mut uni = JsonlSink::create(&cli.univariate_out)?;
    let mut multi = JsonlSink::create(&cli.multivariate_out)?;
    let classifier = RuleClassifier::new();

    let mut total = 0usize;
    let mut filtered_other = 0usize;
    let mut unroutable = 0usize;
    let mut failed_ids: Vec<usize> = Vec::new();

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
                warn!("id {idx}: json parse error: {e}");
                failed_ids.push(idx);
                continue;
            }
        };
        let Some(question) = record::get_str(&data, "input")
            .or_else(|| record::get_str(&data, "question"))
            .map(str::to_string)
        else {
            println!("ID {idx}: missing input, skipping");
            warn!("id {idx}: missing required field input");
            failed_ids.push(idx);
            continue;
        };
        let output = record::get_str(&data, "output").unwrap_or_default().to_string();
        let Some(timeseries) = data.get("timeseries").cloned() else {
            println!("ID {idx}: missing timeseries, skipping");
            warn!("id {idx}: missing required field timeseries");
            failed_ids.push(idx);
            continue;
        };

        let category = classifier.classify(&question, &output);
        if category == TaskCategory::Others {
            println!("ID {idx}: category 4 (others), filtered");
            filtered_other += 1;
            continue;
        }

        let ts_count = record::count_ts_placeholders(&question);

        let mut out_record = RecordMap::new();
        out_record.insert("id".to_string(), json!(idx));
        out_record.insert(
            "task".to_string(),
            Value::String(category.task_name().to_string()),
        );
        out_record.insert("question".to_string(), Value::String(question));
        out_record.insert("output".to_string(), Value::String(output));
        out_record.insert("label".to_string(), Value::String(String::new()));
        out_record.insert("timeseries".to_string(), timeseries);

        match ts_count {
            1 => {
                uni.write(&out_record)?;
                println!("ID {idx}: univariate (category {})", category.number());
            }
            n if n >= 2 => {
                multi.write(&out_record)?;
                println!(
                    "ID {idx}: multivariate (category {}, {n} series)",
                    category.number()
                );
            }
            _ => {
                println!("ID {idx}: no time-series placeholder, dropped");
                warn!("id {idx}: no placeholder in question");
                unroutable += 1;
            }
        }
    }

    let uni_written = uni.written();
    let multi_written = multi.written();
    uni.finish()?;
    multi.finish()?;

    println!("\n=== Classification summary ===");
    println!("Records read       : {total}");
    println!("Univariate written : {uni_written}");
    println!("Multivariate written: {multi_written}");
    println!("Filtered (others)  : {filtered_other}");
    println!("Unroutable         : {unroutable}");
    println!("Failed IDs         : {failed_ids:?}");
    println!("Log file           : {}", log_path.display());
    Ok(())
}
