/*
cargo run --bin classify_llm -- \
    data/sft/chatts_sft_train.jsonl \
    --univariate-out output/univariate_1round.jsonl \
    --multivariate-out output/multivariate_1round.jsonl \
    --model gpt-4o-mini \
    --start-index 0 \
    --end-index 2000
*/

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde_json::{json, Value};
use tokio::time::sleep;

use ts_curate::classify::{build_first_round_prompt, parse_category_response, TaskCategory, CATEGORY_MARKER};
use ts_curate::llm::{complete_with_retry, ChatClient, RetryPolicy};
use ts_curate::record::{self, RecordMap};
use ts_curate::{logging, sink::JsonlSink};

/// Classify questions with the text-completion collaborator and route
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
    let log_path = logging::init("classify_llm")?;

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

    let mut uni = JsonlSink::create(&cli.univariate_out)?;
    let mut multi = JsonlSink::create(&cli.multivariate_out)?;

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
    let mut filtered_other = 0usize;
    let mut unroutable = 0usize;
    let mut issues: Vec<String> = Vec::new();

    for (idx, line) in selected {
        total += 1;
        bar.inc(1);

        let data: RecordMap = match record::parse_line(line) {
            Ok(map) => map,
            Err(e) => {
                warn!("id {idx}: json parse error: {e}");
                issues.push(format!("id {idx}: invalid JSON"));
                continue;
            }
        };
        let Some(question) = record::get_str(&data, "input")
            .or_else(|| record::get_str(&data, "question"))
            .map(str::to_string)
        else {
            warn!("id {idx}: missing required field input");
            issues.push(format!("id {idx}: missing input"));
            continue;
        };
        let output = record::get_str(&data, "output").unwrap_or_default().to_string();
        let Some(timeseries) = data.get("timeseries").cloned() else {
            warn!("id {idx}: missing required field timeseries");
            issues.push(format!("id {idx}: missing timeseries"));
            continue;
        };

        let prompt = build_first_round_prompt(&question);
        if prompt.len() > 95_000 {
            warn!("id {idx}: prompt too large ({} bytes)", prompt.len());
            issues.push(format!("id {idx}: prompt too large"));
            continue;
        }

        info!("[call] id {idx}");
        let response = match complete_with_retry(&client, &policy, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("id {idx}: all attempts failed: {e}");
                issues.push(format!("id {idx}: {e}"));
                sleep(Duration::from_millis(cli.delay_ms)).await;
                continue;
            }
        };
        sleep(Duration::from_millis(cli.delay_ms)).await;

        let Some(category) = parse_category_response(&response, CATEGORY_MARKER) else {
            warn!("id {idx}: no category marker in response: {response:?}");
            issues.push(format!("id {idx}: unparsable response"));
            continue;
        };
        if category == TaskCategory::Others {
            info!("id {idx}: category 4 (others), filtered");
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
                info!("id {idx}: univariate (category {})", category.number());
            }
            n if n >= 2 => {
                multi.write(&out_record)?;
                info!("id {idx}: multivariate (category {}, {n} series)", category.number());
            }
            _ => {
                warn!("id {idx}: no placeholder in question, dropped");
                unroutable += 1;
            }
        }
    }
    bar.finish_with_message("done");

    let uni_written = uni.written();
    let multi_written = multi.written();
    uni.finish()?;
    multi.finish()?;

    println!("\n=== Classification summary ===");
    println!("Records read        : {total}");
    println!("Univariate written  : {uni_written}");
    println!("Multivariate written: {multi_written}");
    println!("Filtered (others)   : {filtered_other}");
    println!("Unroutable          : {unroutable}");
    println!("Issues              : {}", issues.len());
    for issue in &issues {
        println!("  - {issue}");
    }
    println!("Log file            : {}", log_path.display());
    Ok(())
}
