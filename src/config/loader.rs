use super::RefreshConfig;
use crate::error::{ErrorCode, RefreshError, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File name looked up in the working directory before the user config dir
pub const LOCAL_CONFIG_FILE: &str = "pdb-refresh.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Resolve the configuration path when none was given on the command line
///
/// `./pdb-refresh.toml` wins if present, otherwise the per-user config dir.
pub fn default_config_path() -> Result<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    let dirs = ProjectDirs::from("com", "pdb-refresh", "pdb-refresh").ok_or_else(|| {
        RefreshError::config_with_code(
            ErrorCode::CONFIG_PATH_ERROR,
            "could not determine the user configuration directory",
        )
    })?;
    Ok(dirs.config_dir().join("config.toml"))
}

/// Parse configuration text in the format implied by `path`
pub fn parse_config(content: &str, path: &Path) -> Result<RefreshConfig> {
    let config = match ConfigFormat::for_path(path) {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
    };
    Ok(config)
}

/// Render configuration text; secrets are never part of the output
pub fn render_config(config: &RefreshConfig, path: &Path) -> Result<String> {
    match ConfigFormat::for_path(path) {
        ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(|e| {
            RefreshError::config_with_code(ErrorCode::CONFIG_WRITE_FAILED, "cannot render JSON")
                .with_source(e)
        }),
        ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|e| {
            RefreshError::config_with_code(ErrorCode::CONFIG_WRITE_FAILED, "cannot render TOML")
                .with_source(e)
        }),
    }
}

pub async fn load_config(path: &Path) -> Result<RefreshConfig> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Err(RefreshError::config_with_code(
            ErrorCode::CONFIG_NOT_FOUND,
            format!("configuration file {} does not exist", path.display()),
        )
        .with_path(path));
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| RefreshError::from(e).with_context(path.display()))?;

    let config = parse_config(&content, path).map_err(|e| e.with_path(path))?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

pub async fn save_config(config: &RefreshConfig, path: &Path) -> Result<()> {
    let content = render_config(config, path)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|e| {
            RefreshError::config_with_code(
                ErrorCode::CONFIG_WRITE_FAILED,
                format!("cannot create {}", parent.display()),
            )
            .with_source(e)
        })?;
    }

    fs::write(path, content).await.map_err(|e| {
        RefreshError::config_with_code(
            ErrorCode::CONFIG_WRITE_FAILED,
            format!("cannot write {}", path.display()),
        )
        .with_source(e)
        .with_path(path)
    })?;

    tracing::info!("Wrote configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use tempfile::TempDir;

    const TOML_CONFIG: &str = r#"
[source]
host = "prod-db"
ssh_user = "oracle"
oracle_user = "system"
pdb_name = "PRODPDB"
dir_name = "DP_DIR"
dir_path = "/dp"

[target]
host = "qa-db"
port = 2222
ssh_user = "oracle"
db_user = "system"
pdb_name = "QAPDB"
dir_name = "DP_DIR"
dir_path = "/dp"

[refresh]
parallel = 4
command_timeout = "2h"
"#;

    #[test]
    fn test_parse_toml_with_alias_and_defaults() {
        let config = parse_config(TOML_CONFIG, Path::new("c.toml")).unwrap();
        assert_eq!(config.source.db_user, "system");
        assert_eq!(config.source.port, 22);
        assert_eq!(config.target.port, 2222);
        assert_eq!(config.refresh.parallel, 4);
        assert!(config.refresh.flashback_consistent);
        assert_eq!(
            config.refresh.command_timeout,
            Some(std::time::Duration::from_secs(7200))
        );
        assert!(config.source.db_password.is_none());
    }

    #[test]
    fn test_invalid_toml_reports_code() {
        let err = parse_config("[source", Path::new("c.toml")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_INVALID_TOML);
    }

    #[test]
    fn test_json_selected_by_extension() {
        let config = RefreshConfig::template();
        let rendered = render_config(&config, Path::new("c.json")).unwrap();
        assert!(rendered.trim_start().starts_with('{'));
        let parsed = parse_config(&rendered, Path::new("c.json")).unwrap();
        assert_eq!(parsed, config);
    }

    #[tokio::test]
    async fn test_saved_config_never_contains_secrets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("refresh.toml");

        let mut config = RefreshConfig::template();
        config.source.db_password = Some(Secret::new("TopSecret1"));
        config.target.ssh_password = Some(Secret::new("TopSecret2"));
        save_config(&config, &path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("TopSecret"));
        assert!(!text.contains("password"));

        let loaded = load_config(&path).await.unwrap();
        assert!(loaded.source.db_password.is_none());
        assert_eq!(loaded.source.host, config.source.host);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_config(&dir.path().join("absent.toml"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_NOT_FOUND);
    }
}
