//! `pdb-refresh refresh`

use super::{config_path, production_connector};
use crate::app::AppConfig;
use crate::config::{
    apply_env_secrets, load_config, prompt_missing_secrets, EndpointRole, RefreshConfig,
};
use crate::error::Result as RefreshResult;
use crate::refresh::{
    ConsoleSink, LogSink, RefreshMode, RefreshOrchestrator, RefreshReport, RefreshRequest,
};
use crate::remote::RemoteConnector;
use anyhow::Result;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub async fn run_refresh_command(
    mode: RefreshMode,
    schemas: Vec<String>,
    config: Option<PathBuf>,
    app: &AppConfig,
) -> Result<()> {
    let request = RefreshRequest::new(mode, &schemas)?;
    let path = config_path(config)?;
    info!("Loading configuration from {}", path.display());
    let mut config = load_config(&path).await?;
    collect_secrets(&mut config)?;

    let connector = production_connector(&config);
    let sink: Arc<dyn LogSink> = Arc::new(ConsoleSink::new(app.show_remote_output()));
    let report = refresh_with(&connector, &config, &request, sink).await?;

    if report.has_warnings() {
        println!(
            "Refresh {} completed with {} warnings:",
            report.token,
            report.warnings.len()
        );
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
    } else {
        println!(
            "Refresh {} completed in {}s",
            report.token,
            report.duration.as_secs()
        );
    }
    Ok(())
}

/// Fill secrets from the environment, then prompt when a terminal is attached
pub fn collect_secrets(config: &mut RefreshConfig) -> RefreshResult<()> {
    apply_env_secrets(config, |name| std::env::var(name).ok());
    if std::io::stdin().is_terminal() {
        prompt_missing_secrets(config)?;
    } else {
        debug!("stdin is not a terminal; secrets come from the environment only");
    }
    Ok(())
}

/// Connect both hosts, run one refresh and close the sessions again
pub async fn refresh_with(
    connector: &dyn RemoteConnector,
    config: &RefreshConfig,
    request: &RefreshRequest,
    sink: Arc<dyn LogSink>,
) -> RefreshResult<RefreshReport> {
    config.validate()?;

    let source = connector
        .connect(EndpointRole::Source, &config.source)
        .await?;
    let target = match connector
        .connect(EndpointRole::Target, &config.target)
        .await
    {
        Ok(target) => target,
        Err(e) => {
            if let Err(close_err) = source.close().await {
                tracing::warn!("Failed to close {}: {}", source.label(), close_err);
            }
            return Err(e);
        }
    };

    let mut orchestrator = RefreshOrchestrator::with_sessions(source, target);
    let result = orchestrator.start_refresh(config, request, sink).await;
    orchestrator.close_sessions().await?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use crate::error::ErrorCode;
    use crate::refresh::{MemorySink, RefreshMode};
    use crate::remote::{MockConnector, MockRemoteSession};

    fn config() -> RefreshConfig {
        let mut config = RefreshConfig::template();
        config.source.db_password = Some(Secret::new("prodpw"));
        config.target.db_password = Some(Secret::new("qapw"));
        config
    }

    #[tokio::test]
    async fn test_refresh_with_closes_sessions() {
        let source = MockRemoteSession::new("PROD oracle@prod", "prod");
        let target = MockRemoteSession::new("QA oracle@qa", "qa");
        let connector = MockConnector::new()
            .with_session(EndpointRole::Source, source.clone())
            .with_session(EndpointRole::Target, target.clone());
        let request =
            RefreshRequest::with_token(RefreshMode::Full, Vec::<String>::new(), "20240101_000000")
                .unwrap();

        let report = refresh_with(&connector, &config(), &request, Arc::new(MemorySink::new()))
            .await
            .unwrap();

        assert!(!report.has_warnings());
        assert!(source.is_closed());
        assert!(target.is_closed());
        assert_eq!(source.calls_containing("expdp").len(), 1);
        assert_eq!(target.calls_containing("impdp").len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_target_closes_source() {
        let source = MockRemoteSession::new("PROD oracle@prod", "prod");
        let connector = MockConnector::new()
            .with_session(EndpointRole::Source, source.clone())
            .refusing(EndpointRole::Target);
        let request =
            RefreshRequest::with_token(RefreshMode::Full, Vec::<String>::new(), "20240101_000000")
                .unwrap();

        let err = refresh_with(&connector, &config(), &request, Arc::new(MemorySink::new()))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::CONNECTION_UNREACHABLE);
        assert!(source.is_closed());
        assert!(source.calls_containing("expdp").is_empty());
    }

    #[tokio::test]
    async fn test_missing_password_fails_before_connecting() {
        let mut config = config();
        config.target.db_password = None;
        let connector = MockConnector::new().refusing(EndpointRole::Source);
        let request =
            RefreshRequest::with_token(RefreshMode::Full, Vec::<String>::new(), "20240101_000000")
                .unwrap();

        let err = refresh_with(&connector, &config, &request, Arc::new(MemorySink::new()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_MISSING_SECRET);
    }
}
