/*
cargo run --bin ts2jsonl -- \
    data/TEE/TEE_TRAIN.ts \
    data/TEE/TEE_TRAIN.jsonl \
    --task TEE \
    --question-file data/TEE/question.txt \
    --label-map data/TEE/id2label.json
*/

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use serde_json::{json, Value};

use ts_curate::dataset::parse_ts;
use ts_curate::record::RecordMap;
use ts_curate::rounding::round_timeseries;
use ts_curate::{logging, sink::JsonlSink};

/// Convert a multi-series .ts dataset into JSONL records.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input .ts file
    input: PathBuf,

    /// Output JSONL file (truncated at start)
    output: PathBuf,

    /// Task name written into every record
    #[arg(long)]
    task: String,

    /// File holding the question text written into every record
    #[arg(long = "question-file", value_name = "PATH")]
    question_file: Option<PathBuf>,

    /// JSON object mapping raw dataset labels to readable names; raw labels
    /// pass through unchanged when omitted
    #[arg(long = "label-map", value_name = "PATH")]
    label_map: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = logging::init("ts2jsonl")?;

    let text = fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let question = match &cli.question_file {
        Some(p) => fs::read_to_string(p)
            .with_context(|| format!("reading {}", p.display()))?
            .trim()
            .to_string(),
        None => String::new(),
    };
    let label_map: Option<HashMap<String, String>> = match &cli.label_map {
        Some(p) => {
            let raw =
                fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            Some(serde_json::from_str(&raw).with_context(|| format!("parsing {}", p.display()))?)
        }
        None => None,
    };

    let dataset = parse_ts(&text);
    println!("dataset metadata: {}", serde_json::to_string(&dataset.metadata)?);

    let mut out = JsonlSink::create(&cli.output)?;
    let mut unmapped = 0usize;
    let mut rounding_failures = 0usize;

    for (idx, rec) in dataset.records.iter().enumerate() {
        let label = match &label_map {
            Some(map) => match map.get(&rec.label) {
                Some(name) => name.clone(),
                None => {
                    warn!("id {idx}: label {:?} missing from label map, skipping", rec.label);
                    unmapped += 1;
                    continue;
                }
            },
            None => rec.label.clone(),
        };

        let timeseries = json!(rec.series);
        let rounded = match round_timeseries(&timeseries) {
            Ok(v) => v,
            Err(e) => {
                warn!("id {idx}: {e}, skipping");
                rounding_failures += 1;
                continue;
            }
        };

        let mut record = RecordMap::new();
        record.insert("id".to_string(), json!(idx));
        record.insert("task".to_string(), Value::String(cli.task.clone()));
        record.insert("question".to_string(), Value::String(question.clone()));
        record.insert("label".to_string(), Value::String(label));
        record.insert("timeseries".to_string(), timeseries);
        record.insert("timeseries_rounded".to_string(), rounded);
        out.write(&record)?;
    }

    let written = out.written();
    out.finish()?;

    println!("\n=== Conversion summary ===");
    println!("Parsed records     : {}", dataset.records.len());
    println!("Skipped input lines: {}", dataset.skipped_lines);
    println!("Unmapped labels    : {unmapped}");
    println!("Rounding failures  : {rounding_failures}");
    println!("Written records    : {written}");
    println!("Output JSONL       : {}", cli.output.display());
    println!("Log file           : {}", log_path.display());
    Ok(())
}
