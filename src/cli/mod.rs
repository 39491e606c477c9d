pub mod commands;
pub mod errors;
pub mod output;

use crate::config::{CliArgs, ServerConfig};
use crate::logging::init_logging;
use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(
    name = "sheet-rollover-cli",
    version,
    about = "Run, preview and inspect dated-sheet rollovers from the command line"
)]
pub struct Cli {
    #[command(flatten)]
    pub config: CliArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    pub format: OutputFormat,

    #[arg(long, global = true)]
    pub compact: bool,

    /// Log progress to stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the sheet for DATE (default: today) from the latest dated sheet.
    Run {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
    /// Show what `run` would write without creating anything.
    Preview {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
    /// List sheet titles and the date each one parses to.
    ListSheets,
    /// Show the reference sheet and the title the next run would create.
    Select {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
}

pub async fn run_command(cli: Cli) -> Result<Value> {
    let Cli {
        config,
        verbose,
        command,
        ..
    } = cli;
    let config = ServerConfig::from_args(config)?;
    if verbose {
        init_logging(config.log_format)?;
    }
    let service = commands::build_service(&config)?;

    match command {
        Commands::Run { date } => commands::run(&service, date).await,
        Commands::Preview { date } => commands::preview(&service, date).await,
        Commands::ListSheets => commands::list_sheets(&service).await,
        Commands::Select { date } => commands::select(&service, date).await,
    }
}
