/*
cargo run --bin reclassify_llm -- \
    output/multivariate_1round.jsonl \
    output/multivariate_2round.jsonl \
    --model gpt-4o-mini \
    --start-index 0 \
    --end-index 250
*/

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde_json::Value;
use tokio::time::sleep;

use ts_curate::classify::{
    build_revalidation_prompt, parse_category_response, TaskCategory, FINAL_CATEGORY_MARKER,
};
use ts_curate::llm::{complete_with_retry, ChatClient, RetryPolicy};
use ts_curate::record::{self, RecordMap};
use ts_curate::{logging, sink::JsonlSink};

/// Second-round re-validation: the collaborator confirms or corrects the
/// task category of already classified records.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input JSONL file (first-round output)
    input: PathBuf,

    /// Output JSONL file (truncated at start)
    output: PathBuf,

    /// First line index to process (inclusive, 0-based)
    #[arg(long = "start-index", default_value_t = 0)]
    start_index: usize,

    /// Last line index to process (inclusive); all lines when omitted
    #[arg(long = "end-index")]
    end_index: Option<usize>,

    /// Chat-completions model name
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// OpenAI-compatible endpoint base URL
    #[arg(long = "base-url", default_value = "https://api.openai.com/v1")]
    base_url: String,

    /// API key (overrides $OPENAI_API_KEY)
    #[arg(long = "api-key", value_name = "KEY")]
    api_key: Option<String>,

    #[arg(long, default_value_t = 3)]
    max_attempts: u8,

    /// Milliseconds to wait between retry attempts
    #[arg(long = "retry-delay-ms", default_value_t = 5000)]
    retry_delay_ms: u64,

    /// Milliseconds to wait after every collaborator call
    #[arg(long = "delay-ms", default_value_t = 1000)]
    delay_ms: u64,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = logging::init("reclassify_llm")?;

    let api_key = cli
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .context("provide --api-key or set OPENAI_API_KEY")?;
    let client = ChatClient::new(&cli.base_url, &api_key, &cli.model)
        .context("building chat client")?;
    let policy = RetryPolicy {
        max_attempts: cli.max_attempts,
        retry_delay: Duration::from_millis(cli.retry_delay_ms),
    };
    info!("run started -> model={} base_url={}", cli.model, cli.base_url);

    let file =
        File::open(&cli.input).with_context(|| format!("opening {}", cli.input.display()))?;
    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("reading {}", cli.input.display()))?;

    let mut out = JsonlSink::create(&cli.output)?;

    let end = cli.end_index.unwrap_or(usize::MAX);
    let selected: Vec<(usize, &String)> = lines
        .iter()
        .enumerate()
        .filter(|(idx, line)| *idx >= cli.start_index && *idx <= end && !line.trim().is_empty())
        .collect();

    let bar = ProgressBar::new(selected.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
    )?);

    let mut total = 0usize;
    let mut changed = 0usize;
    let mut dropped_other = 0usize;
    let mut issues: Vec<String> = Vec::new();

    for (idx, line) in selected {
        total += 1;
        bar.inc(1);

        let mut data: RecordMap = match record::parse_line(line) {
            Ok(map) => map,
            Err(e) => {
                warn!("id {idx}: json parse error: {e}");
                issues.push(format!("id {idx}: invalid JSON"));
                continue;
            }
        };
        let id = record::display_id(&data);
        let Some(question) = record::get_str(&data, "question").map(str::to_string) else {
            warn!("id {id}: missing required field question");
            issues.push(format!("id {id}: missing question"));
            continue;
        };
        let Some(original) =
            record::get_str(&data, "task").and_then(TaskCategory::from_task_name)
        else {
            warn!("id {id}: unknown original task, skipping");
            issues.push(format!("id {id}: unknown task"));
            continue;
        };

        let prompt = build_revalidation_prompt(&question, original.task_name());
        if prompt.len() > 95_000 {
            warn!("id {id}: prompt too large ({} bytes)", prompt.len());
            issues.push(format!("id {id}: prompt too large"));
            continue;
        }

        info!("[call] id {id}");
        let response = match complete_with_retry(&client, &policy, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("id {id}: all attempts failed: {e}");
                issues.push(format!("id {id}: {e}"));
                sleep(Duration::from_millis(cli.delay_ms)).await;
                continue;
            }
        };
        sleep(Duration::from_millis(cli.delay_ms)).await;

        let Some(final_category) = parse_category_response(&response, FINAL_CATEGORY_MARKER)
        else {
            warn!("id {id}: no final category marker in response: {response:?}");
            issues.push(format!("id {id}: unparsable response"));
            continue;
        };

        if final_category != original {
            changed += 1;
        }
        if final_category == TaskCategory::Others {
            info!("id {id}: final category 4 (others), dropped");
            dropped_other += 1;
            continue;
        }

        data.insert(
            "task".to_string(),
            Value::String(final_category.task_name().to_string()),
        );
        out.write(&data)?;
        info!("id {id}: final category {}", final_category.number());
    }
    bar.finish_with_message("done");

    let written = out.written();
    out.finish()?;

    println!("\n=== Re-validation summary ===");
    println!("Records read   : {total}");
    println!("Written        : {written}");
    println!("Reclassified   : {changed}");
    println!("Dropped (others): {dropped_other}");
    println!("Issues         : {}", issues.len());
    for issue in &issues {
        println!("  - {issue}");
    }
    println!("Log file       : {}", log_path.display());
    Ok(())
}
