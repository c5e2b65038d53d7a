pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "bento")]
#[command(about = "Bento CLI - operator commands for the Bento API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending database migrations (uses DATABASE_URL)")]
    Migrate,

    #[command(about = "Health check a running server")]
    Health {
        #[arg(long, help = "Server base URL (defaults to API_BASE_URL)")]
        url: Option<String>,
    },

    #[command(about = "Print the effective configuration with secrets redacted")]
    Config,
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
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Health { url } => commands::health::handle(url, output_format).await,
        Commands::Config => commands::config::handle(output_format),
    }
}
