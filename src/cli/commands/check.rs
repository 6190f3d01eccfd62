//! `pdb-refresh check`

use super::{config_path, production_connector};
use crate::config::{load_config, EndpointRole, RefreshConfig};
use crate::error::Result as RefreshResult;
use crate::remote::{EnvironmentResolver, RemoteConnector, RemoteEnvironment};
use anyhow::Result;
use std::path::PathBuf;

/// What `check` found on one host
#[derive(Debug, Clone)]
pub struct HostCheck {
    pub label: String,
    pub environment: RemoteEnvironment,
}

impl HostCheck {
    pub fn has_oracle_home(&self) -> bool {
        !self.environment.get("ORACLE_HOME").is_empty()
    }
}

pub async fn run_check_command(config: Option<PathBuf>) -> Result<()> {
    let path = config_path(config)?;
    let mut config = load_config(&path).await?;
    super::collect_secrets(&mut config)?;

    let connector = production_connector(&config);
    for check in check_with(&connector, &config).await? {
        println!("{}", check.label);
        if check.environment.is_empty() {
            println!("  warning: no database environment variables found");
            continue;
        }
        for (key, value) in check.environment.iter() {
            println!("  {}={}", key, value);
        }
        if !check.has_oracle_home() {
            println!("  warning: ORACLE_HOME is not set");
        }
    }
    Ok(())
}

/// Connect to both hosts and resolve their environment
///
/// Only the connection is needed here, so database passwords are not
/// required.
pub async fn check_with(
    connector: &dyn RemoteConnector,
    config: &RefreshConfig,
) -> RefreshResult<Vec<HostCheck>> {
    let resolver = EnvironmentResolver;
    let mut checks = Vec::new();

    for role in [EndpointRole::Source, EndpointRole::Target] {
        let session = connector.connect(role, config.endpoint(role)).await?;
        let resolved = resolver.resolve(session.as_ref()).await;
        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close {}: {}", session.label(), e);
        }
        checks.push(HostCheck {
            label: session.label().to_string(),
            environment: resolved?,
        });
    }
    Ok(checks)
}
