//! Subcommand implementations

pub mod check;
pub mod config;
pub mod refresh;

pub use check::{check_with, run_check_command, HostCheck};
pub use config::run_config_command;
pub use refresh::{collect_secrets, refresh_with, run_refresh_command};

use crate::config::{default_config_path, RefreshConfig};
use crate::remote::OpenSshConnector;
use crate::subprocess::SubprocessManager;
use std::path::PathBuf;

/// The explicit `--config` path or the default location
pub(crate) fn config_path(explicit: Option<PathBuf>) -> crate::error::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => default_config_path(),
    }
}

/// Connector backed by the system ssh client
pub(crate) fn production_connector(config: &RefreshConfig) -> OpenSshConnector {
    OpenSshConnector::new(
        SubprocessManager::production().runner(),
        config.refresh.command_timeout,
    )
}
