use super::RemoteSession;
use crate::error::Result;
use std::collections::BTreeMap;

/// Login profile sourcing shared by every remote script
///
/// Non-interactive sessions do not read the login profile, so the database
/// toolchain is not on the search path until one of these is sourced.
pub const PROFILE_PREFIX: &str =
    "source ~/.bash_profile > /dev/null 2>&1 || source ~/.profile > /dev/null 2>&1";

/// Variables exported explicitly in front of every database command
pub const EXPORTED_VARIABLES: [&str; 4] = ["ORACLE_HOME", "PATH", "TNS_ADMIN", "LD_LIBRARY_PATH"];

const QUERY: &str = "env | grep -E 'ORACLE|TNS|PATH'";

/// Environment of a remote login shell, resolved once per host per run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteEnvironment {
    vars: BTreeMap<String, String>,
}

impl RemoteEnvironment {
    /// Parse `KEY=VALUE` lines; anything without `=` is skipped
    pub fn parse(text: &str) -> Self {
        let vars = text
            .lines()
            .filter_map(|line| line.split_once('='))
            .filter(|(key, _)| !key.trim().is_empty())
            .map(|(key, value)| (key.trim().to_string(), value.trim_end().to_string()))
            .collect();
        Self { vars }
    }

    /// Value of `key`, or the empty string when it was not resolved
    pub fn get(&self, key: &str) -> &str {
        self.vars.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RemoteEnvironment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Reads the database related environment of a remote login shell
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentResolver;

impl EnvironmentResolver {
    pub fn script() -> String {
        format!("{}; {}", PROFILE_PREFIX, QUERY)
    }

    /// Query the session once. Transport failures propagate and are not retried.
    pub async fn resolve(&self, session: &dyn RemoteSession) -> Result<RemoteEnvironment> {
        let output = session.execute(&Self::script()).await?;

        if !output.stderr.trim().is_empty() {
            tracing::debug!(
                "Environment query on {} wrote to stderr: {}",
                session.label(),
                output.stderr.trim()
            );
        }

        let environment = RemoteEnvironment::parse(&output.stdout);
        if environment.is_empty() {
            tracing::warn!(
                "No ORACLE/TNS/PATH variables found on {}; commands run with empty values",
                session.label()
            );
        } else {
            tracing::debug!(
                "Resolved {} variables on {}",
                environment.len(),
                session.label()
            );
        }
        Ok(environment)
    }
}
