use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::{json, Value};

use crate::cli::utils::{describe_plan, format_remaining, plan_json};
use crate::cli::OutputFormat;
use crate::config;
use crate::refresh::{plan_deadline, seconds_until, UrlInput, UrlMetadata};

#[derive(Args)]
pub struct InspectArgs {
    #[arg(help = "Bare URL or metadata JSON, e.g. '{\"url\":\"...\",\"expiresAt\":\"2030-01-01T00:00:00Z\"}'")]
    pub input: String,

    #[arg(long, help = "Refresh buffer in milliseconds (defaults to REFRESH_BUFFER_MS)")]
    pub buffer_ms: Option<u64>,
}

pub async fn handle(args: InspectArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let input: UrlInput = args
        .input
        .parse()
        .context("input is neither a URL nor valid metadata JSON")?;
    let refresh = &config::config().refresh;
    let buffer = Duration::from_millis(args.buffer_ms.unwrap_or(refresh.buffer_ms));

    let report = inspect(UrlMetadata::from(input), buffer, refresh.auto_refresh, Utc::now());

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }
    Ok(())
}

fn inspect(metadata: UrlMetadata, buffer: Duration, auto_refresh: bool, now: DateTime<Utc>) -> Value {
    let remaining = seconds_until(metadata.expires_at, now);
    let plan = plan_deadline(&metadata, buffer, auto_refresh, now);

    json!({
        "metadata": metadata,
        "timeUntilExpiry": remaining,
        "bufferMs": buffer.as_millis() as u64,
        "autoRefresh": auto_refresh,
        "plan": plan_json(&plan),
        "summary": describe_plan(&plan),
    })
}

fn print_text(report: &Value) {
    println!("URL:        {}", report["metadata"]["url"].as_str().unwrap_or_default());
    match report["metadata"]["expiresAt"].as_str() {
        Some(at) => println!("Expires at: {}", at),
        None => println!("Expires at: never"),
    }
    if let Some(seconds) = report["timeUntilExpiry"].as_u64() {
        println!("Remaining:  {}", format_remaining(seconds));
    }
    println!("Schedule:   {}", report["summary"].as_str().unwrap_or_default());
}
