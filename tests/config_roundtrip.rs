//! Persisted configuration keeps every setting except the secrets

use pdb_refresh::config::{load_config, save_config, RefreshConfig, Secret};
use std::time::Duration;
use tempfile::TempDir;

fn configured() -> RefreshConfig {
    let mut config = RefreshConfig::template();
    config.source.port = 2222;
    config.target.dir_path = "/backup/dpdump/".to_string();
    config.refresh.parallel = 8;
    config.refresh.flashback_consistent = false;
    config.refresh.command_timeout = Some(Duration::from_secs(3 * 3600));
    config.refresh.indicators.export = vec!["job completed".to_string()];
    config
}

fn with_secrets(mut config: RefreshConfig) -> RefreshConfig {
    config.source.ssh_password = Some(Secret::new("prod-shell-pw"));
    config.source.db_password = Some(Secret::new("prod-db-pw"));
    config.target.ssh_password = Some(Secret::new("qa-shell-pw"));
    config.target.db_password = Some(Secret::new("qa-db-pw"));
    config
}

#[tokio::test]
async fn test_toml_round_trip_drops_only_secrets() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("pdb-refresh.toml");

    let expected = configured();
    save_config(&with_secrets(expected.clone()), &path)
        .await
        .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    for secret in ["prod-shell-pw", "prod-db-pw", "qa-shell-pw", "qa-db-pw"] {
        assert!(!content.contains(secret));
    }
    assert!(!content.contains("password"));
    assert!(content.contains("command_timeout = \"3h\""));

    let loaded = load_config(&path).await.unwrap();
    assert_eq!(loaded, expected);
    assert!(loaded.source.db_password.is_none());
}

#[tokio::test]
async fn test_json_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");

    let expected = configured();
    save_config(&with_secrets(expected.clone()), &path)
        .await
        .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.trim_start().starts_with('{'));
    assert!(!content.contains("qa-db-pw"));
    assert_eq!(load_config(&path).await.unwrap(), expected);
}

#[tokio::test]
async fn test_legacy_json_loads_with_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
  "source": {
    "host": "10.0.0.5",
    "ssh_user": "oracle",
    "oracle_user": "system",
    "pdb_name": "PRODPDB",
    "dir_name": "DP_DIR",
    "dir_path": "/u01/dp"
  },
  "target": {
    "host": "10.0.0.6",
    "ssh_user": "oracle",
    "oracle_user": "system",
    "pdb_name": "QAPDB",
    "dir_name": "DP_DIR",
    "dir_path": "/u01/dp"
  }
}"#,
    )
    .unwrap();

    let config = load_config(&path).await.unwrap();
    assert_eq!(config.source.db_user, "system");
    assert_eq!(config.target.port, 22);
    assert_eq!(config.refresh.parallel, 2);
    assert!(config.refresh.flashback_consistent);
    assert!(config.refresh.command_timeout.is_none());
    assert!(config.target.ssh_password.is_none());
}
