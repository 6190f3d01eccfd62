//! `pdb-refresh config`

use super::config_path;
use crate::cli::args::ConfigCommands;
use crate::config::{load_config, render_config, save_config, RefreshConfig};
use crate::error::{ErrorCode, RefreshError};
use anyhow::Result;
use std::path::PathBuf;

pub async fn run_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Init { output, force } => handle_init(output, force).await,
        ConfigCommands::Show { config } => handle_show(config).await,
    }
}

async fn handle_init(output: Option<PathBuf>, force: bool) -> Result<()> {
    let path = config_path(output)?;
    if path.exists() && !force {
        return Err(RefreshError::config_with_code(
            ErrorCode::CONFIG_WRITE_FAILED,
            "file already exists; pass --force to overwrite",
        )
        .with_path(&path)
        .into());
    }

    save_config(&RefreshConfig::template(), &path).await?;
    println!("Wrote configuration template to {}", path.display());
    println!("Passwords are not stored; they are asked for on every run.");
    Ok(())
}

async fn handle_show(config: Option<PathBuf>) -> Result<()> {
    let path = config_path(config)?;
    let config = load_config(&path).await?;
    println!("# {}", path.display());
    print!("{}", render_config(&config, &path)?);
    Ok(())
}
