//! Command routing and execution

use crate::app::AppConfig;
use crate::cli::args::Commands;
use crate::cli::commands::*;
use anyhow::Result;

/// Execute a CLI command based on the parsed arguments
pub async fn execute_command(command: Commands, app: &AppConfig) -> Result<()> {
    match command {
        Commands::Refresh {
            mode,
            schemas,
            config,
        } => run_refresh_command(mode, schemas, config, app).await,
        Commands::Check { config } => run_check_command(config).await,
        Commands::Config { command } => run_config_command(command).await,
    }
}
