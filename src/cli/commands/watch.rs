use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::cli::utils::{format_remaining, output_error};
use crate::cli::OutputFormat;
use crate::config;
use crate::refresh::{HttpUrlSource, RefreshOptions, UrlRefreshManager, UrlSnapshot};

#[derive(Args)]
pub struct WatchArgs {
    #[arg(help = "Endpoint returning fresh URL metadata, e.g. http://localhost:3000/api/blobs/url/logo.png")]
    pub endpoint: String,

    #[arg(long, help = "Refresh buffer in milliseconds (defaults to REFRESH_BUFFER_MS)")]
    pub buffer_ms: Option<u64>,

    #[arg(long, help = "Stop after this many seconds instead of waiting for Ctrl-C")]
    pub duration_secs: Option<u64>,

    #[arg(long, help = "Bearer token sent to the endpoint")]
    pub token: Option<String>,

    #[arg(long, help = "Also print countdown-only changes")]
    pub countdown: bool,
}

pub async fn handle(args: WatchArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();

    let mut source = HttpUrlSource::new(&args.endpoint, Duration::from_secs(config.api.request_timeout_secs))?;
    if let Some(token) = args.token {
        source = source.with_bearer_token(token);
    }

    let mut options = RefreshOptions::from(&config.refresh);
    if let Some(ms) = args.buffer_ms {
        options.buffer = Duration::from_millis(ms);
    }

    let manager = UrlRefreshManager::builder()
        .options(options)
        .callback(source)
        .build(None)
        .context("starting the refresh manager")?;
    let mut updates = manager.subscribe();

    // First fetch; on failure the retry policy keeps going in the background
    if let Err(e) = manager.refresh().await {
        output_error(&output_format, &e.to_string(), Some("REFRESH_FAILED"))?;
    }

    let stop_at = args.duration_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut last = updates.borrow_and_update().clone();
    print_snapshot(&last, &output_format)?;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if args.countdown || !only_countdown_moved(&last, &snapshot) {
                    print_snapshot(&snapshot, &output_format)?;
                }
                last = snapshot;
            }
            _ = wait_until(stop_at) => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    manager.dispose();
    Ok(())
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn only_countdown_moved(before: &UrlSnapshot, after: &UrlSnapshot) -> bool {
    UrlSnapshot {
        time_until_expiry: after.time_until_expiry,
        ..before.clone()
    } == *after
}

fn snapshot_json(snapshot: &UrlSnapshot) -> Value {
    json!({
        "phase": snapshot.phase,
        "url": snapshot.url,
        "expiresAt": snapshot.expires_at,
        "timeUntilExpiry": snapshot.time_until_expiry,
        "isRefreshing": snapshot.is_refreshing,
        "retryCount": snapshot.retry_count,
        "error": snapshot.error.as_ref().map(|e| e.to_string()),
    })
}

fn print_snapshot(snapshot: &UrlSnapshot, output_format: &OutputFormat) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&snapshot_json(snapshot))?),
        OutputFormat::Text => {
            let remaining = snapshot
                .time_until_expiry
                .map(format_remaining)
                .unwrap_or_else(|| "-".to_string());
            let mut line = format!(
                "[{:<10}] {:>11}  {}",
                snapshot.phase,
                remaining,
                snapshot.url.as_deref().unwrap_or("(no url)")
            );
            if let Some(error) = &snapshot.error {
                line.push_str(&format!("  error: {} (retry {})", error, snapshot.retry_count));
            }
            println!("{}", line);
        }
    }
    Ok(())
}
