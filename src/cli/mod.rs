pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "wfzo")]
#[command(about = "WFZO CLI - inspect, sign and watch short-lived blob URLs")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Show how a URL or metadata JSON would be scheduled for refresh")]
    Inspect(commands::inspect::InspectArgs),

    #[command(about = "Issue a signed blob link with the configured secret")]
    Sign(commands::sign::SignArgs),

    #[command(about = "Keep a link fresh from a signing endpoint and print every change")]
    Watch(commands::watch::WatchArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Inspect(args) => commands::inspect::handle(args, output_format).await,
        Commands::Sign(args) => commands::sign::handle(args, output_format).await,
        Commands::Watch(args) => commands::watch::handle(args, output_format).await,
    }
}
