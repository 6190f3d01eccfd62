//! Per-run credential entry
//!
//! Secrets come from `PDB_REFRESH_{SOURCE|TARGET}_{SSH|DB}_PASSWORD` or, when
//! running interactively, from a hidden prompt. They are never persisted.

use super::{EndpointRole, RefreshConfig, Secret};
use crate::error::{ErrorCode, RefreshError, Result};
use dialoguer::Password;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    Ssh,
    Database,
}

impl SecretKind {
    fn env_fragment(&self) -> &'static str {
        match self {
            SecretKind::Ssh => "SSH",
            SecretKind::Database => "DB",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            SecretKind::Ssh => "SSH password (empty for key authentication)",
            SecretKind::Database => "database password",
        }
    }
}

/// Environment variable consulted for a secret
pub fn secret_env_var(role: EndpointRole, kind: SecretKind) -> String {
    format!(
        "PDB_REFRESH_{}_{}_PASSWORD",
        role.section().to_uppercase(),
        kind.env_fragment()
    )
}

const ROLES: [EndpointRole; 2] = [EndpointRole::Source, EndpointRole::Target];
const KINDS: [SecretKind; 2] = [SecretKind::Ssh, SecretKind::Database];

fn slot(config: &mut RefreshConfig, role: EndpointRole, kind: SecretKind) -> &mut Option<Secret> {
    let endpoint = config.endpoint_mut(role);
    match kind {
        SecretKind::Ssh => &mut endpoint.ssh_password,
        SecretKind::Database => &mut endpoint.db_password,
    }
}

/// Fill unset secrets from the environment
///
/// `lookup` is `std::env::var(..).ok()` in production and a map in tests.
pub fn apply_env_secrets<F>(config: &mut RefreshConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for role in ROLES {
        for kind in KINDS {
            let target = slot(config, role, kind);
            if target.is_some() {
                continue;
            }
            let var = secret_env_var(role, kind);
            if let Some(value) = lookup(&var) {
                tracing::debug!("Using {} from the environment", var);
                *target = Some(Secret::new(value));
            }
        }
    }
}

/// Ask for every secret still missing after the environment was consulted
///
/// An empty SSH password is kept as "no password" so that key based
/// logins keep working.
pub fn prompt_missing_secrets(config: &mut RefreshConfig) -> Result<()> {
    for role in ROLES {
        for kind in KINDS {
            let host = config.endpoint(role).host.clone();
            let target = slot(config, role, kind);
            if target.is_some() {
                continue;
            }

            let value = Password::new()
                .with_prompt(format!("{} {} for {}", role.label(), kind.describe(), host))
                .allow_empty_password(kind == SecretKind::Ssh)
                .interact()
                .map_err(|e| {
                    RefreshError::config_with_code(
                        ErrorCode::CONFIG_MISSING_SECRET,
                        format!("could not read {} for {}", kind.describe(), role.section()),
                    )
                    .with_source(e)
                })?;

            if !value.is_empty() {
                *target = Some(Secret::new(value));
            }
        }
    }
    Ok(())
}
