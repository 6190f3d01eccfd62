//! Connection parameters for the two ends of a refresh
//!
//! Everything here except the secrets is persisted. Secrets are re-entered
//! for every run, either from the environment or from a hidden prompt.

use crate::error::{ErrorCode, RefreshError, Result};
use crate::refresh::classifier::OutcomeIndicators;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod loader;
pub mod secrets;

pub use loader::{default_config_path, load_config, parse_config, render_config, save_config};
pub use secrets::{apply_env_secrets, prompt_missing_secrets, secret_env_var, SecretKind};

/// Which end of the refresh an endpoint is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointRole {
    Source,
    Target,
}

impl EndpointRole {
    /// Short label used in log lines (`PROD` / `QA`)
    pub fn label(&self) -> &'static str {
        match self {
            EndpointRole::Source => "PROD",
            EndpointRole::Target => "QA",
        }
    }

    /// Section name in the persisted configuration
    pub fn section(&self) -> &'static str {
        match self {
            EndpointRole::Source => "source",
            EndpointRole::Target => "target",
        }
    }
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A credential that must never be written to disk or to a log
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(********)")
    }
}

fn default_ssh_port() -> u16 {
    22
}

/// One database host: shell login, database login, and Data Pump directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub ssh_user: String,
    #[serde(alias = "oracle_user")]
    pub db_user: String,
    /// Service or pluggable database name the database client connects to
    pub pdb_name: String,
    /// Server-side directory object used by expdp/impdp
    pub dir_name: String,
    /// Filesystem path behind `dir_name`
    pub dir_path: String,
    #[serde(skip)]
    pub ssh_password: Option<Secret>,
    #[serde(skip)]
    pub db_password: Option<Secret>,
}

impl EndpointConfig {
    /// Check every field a refresh needs, including the database password
    pub fn validate(&self, role: EndpointRole) -> Result<()> {
        let required = [
            ("host", &self.host),
            ("ssh_user", &self.ssh_user),
            ("db_user", &self.db_user),
            ("pdb_name", &self.pdb_name),
            ("dir_name", &self.dir_name),
            ("dir_path", &self.dir_path),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(RefreshError::config_with_code(
                    ErrorCode::CONFIG_MISSING_REQUIRED,
                    format!("{}.{} must not be empty", role.section(), field),
                ));
            }
        }

        match &self.db_password {
            None => Err(RefreshError::config_with_code(
                ErrorCode::CONFIG_MISSING_SECRET,
                format!(
                    "no database password for {} ({})",
                    role.section(),
                    secret_env_var(role, SecretKind::Database)
                ),
            )),
            Some(secret) if secret.is_empty() => Err(RefreshError::config_with_code(
                ErrorCode::CONFIG_MISSING_SECRET,
                format!("empty database password for {}", role.section()),
            )),
            Some(secret) if secret.expose().contains('"') => Err(RefreshError::config_with_code(
                ErrorCode::CONFIG_MISSING_SECRET,
                format!(
                    "database password for {} must not contain '\"'",
                    role.section()
                ),
            )),
            Some(_) => Ok(()),
        }
    }

    /// `user/"password"@service` connect identifier for the database tools
    ///
    /// The password is always quoted so that `@` and `/` inside it survive.
    pub fn db_connect_string(&self) -> Option<String> {
        self.db_password
            .as_ref()
            .map(|pw| format!("{}/\"{}\"@{}", self.db_user, pw.expose(), self.pdb_name))
    }

    /// Every secret configured on this endpoint, for log scrubbing
    pub fn secrets(&self) -> Vec<&Secret> {
        self.ssh_password
            .iter()
            .chain(self.db_password.iter())
            .collect()
    }

    /// Absolute path of a file inside the Data Pump directory
    pub fn dir_file(&self, file_name: &str) -> String {
        format!("{}/{}", self.dir_path.trim_end_matches('/'), file_name)
    }
}

fn default_parallel() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

/// Tunables for the refresh run itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSettings {
    /// Data Pump worker count for both export and import
    #[serde(default = "default_parallel")]
    pub parallel: u32,
    /// Export as of a single point in time (`flashback_time=systimestamp`)
    #[serde(default = "default_true")]
    pub flashback_consistent: bool,
    /// Upper bound for any single remote command; unset means wait forever
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub command_timeout: Option<Duration>,
    #[serde(default)]
    pub indicators: OutcomeIndicators,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            flashback_consistent: true,
            command_timeout: None,
            indicators: OutcomeIndicators::default(),
        }
    }
}

/// Persisted configuration: `[source]`, `[target]` and optional `[refresh]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub source: EndpointConfig,
    pub target: EndpointConfig,
    #[serde(default)]
    pub refresh: RefreshSettings,
}

impl RefreshConfig {
    pub fn endpoint(&self, role: EndpointRole) -> &EndpointConfig {
        match role {
            EndpointRole::Source => &self.source,
            EndpointRole::Target => &self.target,
        }
    }

    pub fn endpoint_mut(&mut self, role: EndpointRole) -> &mut EndpointConfig {
        match role {
            EndpointRole::Source => &mut self.source,
            EndpointRole::Target => &mut self.target,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.source.validate(EndpointRole::Source)?;
        self.target.validate(EndpointRole::Target)?;
        if self.refresh.parallel == 0 {
            return Err(RefreshError::config_with_code(
                ErrorCode::CONFIG_MISSING_REQUIRED,
                "refresh.parallel must be at least 1",
            ));
        }
        Ok(())
    }

    /// A filled-in example used by `config init`
    pub fn template() -> Self {
        let endpoint = |host: &str, pdb: &str| EndpointConfig {
            host: host.to_string(),
            port: default_ssh_port(),
            ssh_user: "oracle".to_string(),
            db_user: "system".to_string(),
            pdb_name: pdb.to_string(),
            dir_name: "DATA_PUMP_DIR".to_string(),
            dir_path: "/u01/app/oracle/admin/dpdump".to_string(),
            ssh_password: None,
            db_password: None,
        };

        Self {
            source: endpoint("prod-db.example.com", "PRODPDB"),
            target: endpoint("qa-db.example.com", "QAPDB"),
            refresh: RefreshSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint_with_password() -> EndpointConfig {
        let mut endpoint = RefreshConfig::template().source;
        endpoint.db_password = Some(Secret::new("p@ss/word"));
        endpoint
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{:?}", secret), "Secret(********)");

        let endpoint = endpoint_with_password();
        assert!(!format!("{:?}", endpoint).contains("p@ss/word"));
    }

    #[test]
    fn test_connect_string_quotes_password() {
        let endpoint = endpoint_with_password();
        assert_eq!(
            endpoint.db_connect_string().unwrap(),
            "system/\"p@ss/word\"@PRODPDB"
        );
    }

    #[test]
    fn test_validate_requires_db_password() {
        let endpoint = RefreshConfig::template().target;
        let err = endpoint.validate(EndpointRole::Target).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_MISSING_SECRET);
        assert!(err.to_string().contains("PDB_REFRESH_TARGET_DB_PASSWORD"));
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let mut endpoint = endpoint_with_password();
        endpoint.dir_path = "  ".to_string();
        let err = endpoint.validate(EndpointRole::Source).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_MISSING_REQUIRED);
        assert!(err.to_string().contains("source.dir_path"));
    }

    #[test]
    fn test_validate_rejects_quote_in_password() {
        let mut endpoint = endpoint_with_password();
        endpoint.db_password = Some(Secret::new("bad\"pw"));
        assert!(endpoint.validate(EndpointRole::Source).is_err());
    }

    #[test]
    fn test_dir_file_joins_paths() {
        let mut endpoint = endpoint_with_password();
        endpoint.dir_path = "/dpdump/".to_string();
        assert_eq!(endpoint.dir_file("a.dmp"), "/dpdump/a.dmp");
    }

    #[test]
    fn test_zero_parallel_is_rejected() {
        let mut config = RefreshConfig::template();
        config.source.db_password = Some(Secret::new("a"));
        config.target.db_password = Some(Secret::new("b"));
        assert!(config.validate().is_ok());

        config.refresh.parallel = 0;
        assert!(config.validate().is_err());
    }
}
