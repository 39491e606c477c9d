use anyhow::Result;
use clap::Parser;
use sheet_rollover::{CliArgs, ServerConfig, init_logging, run_server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();
    let config = ServerConfig::from_args(cli)?;
    init_logging(config.log_format)?;
    run_server(config).await
}
