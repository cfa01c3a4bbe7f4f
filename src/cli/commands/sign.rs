use std::time::Duration;

use anyhow::Context;
use clap::Args;

use crate::cli::utils::{format_remaining, output_success};
use crate::cli::OutputFormat;
use crate::config;
use crate::signing::UrlSigner;

#[derive(Args)]
pub struct SignArgs {
    #[arg(help = "Blob path, e.g. members/logo.png")]
    pub path: String,

    #[arg(long, help = "Link lifetime in seconds (defaults to SIGNING_TTL_SECS)")]
    pub ttl: Option<u64>,
}

pub async fn handle(args: SignArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let signer = UrlSigner::from_config(&config::config().signing)
        .context("set SIGNING_SECRET and SIGNING_BASE_URL to sign links")?;
    let signer = match args.ttl {
        Some(ttl) => signer.with_ttl(Duration::from_secs(ttl))?,
        None => signer,
    };

    let metadata = signer.sign(&args.path)?;

    match output_format {
        OutputFormat::Json => {
            output_success(&output_format, "Link signed", Some(serde_json::to_value(&metadata)?))?;
        }
        OutputFormat::Text => {
            println!("{}", metadata.url);
            if let Some(at) = metadata.expires_at {
                println!("expires {} (in {})", at.to_rfc3339(), format_remaining(signer.ttl().as_secs()));
            }
        }
    }
    Ok(())
}
