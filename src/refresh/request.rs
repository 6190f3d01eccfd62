use crate::error::{ErrorCode, RefreshError, Result};
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

static SCHEMA_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_$#]{0,127}$").expect("Valid regex pattern"));

/// Format of the token shared by every artifact of a run
pub const TOKEN_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Whole database
    Full,
    /// Only the named schemas, with grant preservation and purge
    Schema,
}

impl RefreshMode {
    pub fn is_schema(&self) -> bool {
        matches!(self, RefreshMode::Schema)
    }
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshMode::Full => f.write_str("full"),
            RefreshMode::Schema => f.write_str("schema"),
        }
    }
}

impl FromStr for RefreshMode {
    type Err = RefreshError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(RefreshMode::Full),
            "schema" | "schemas" => Ok(RefreshMode::Schema),
            other => Err(RefreshError::validation_with_code(
                ErrorCode::VALIDATION_INVALID_INPUT,
                format!("unknown refresh mode '{}' (expected full or schema)", other),
                Some("mode".to_string()),
            )),
        }
    }
}

/// One refresh run: mode, schemas and the naming token for its artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    mode: RefreshMode,
    schemas: Vec<String>,
    token: String,
}

impl RefreshRequest {
    /// Build a request stamped with the current local time
    pub fn new<I, S>(mode: RefreshMode, schemas: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_timestamp(mode, schemas, Local::now())
    }

    pub fn with_timestamp<I, S>(mode: RefreshMode, schemas: I, at: DateTime<Local>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_token(mode, schemas, at.format(TOKEN_FORMAT).to_string())
    }

    /// Build a request with an explicit token
    pub fn with_token<I, S>(mode: RefreshMode, schemas: I, token: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let schemas = match mode {
            RefreshMode::Full => Vec::new(),
            RefreshMode::Schema => normalize_schemas(schemas)?,
        };

        if mode.is_schema() && schemas.is_empty() {
            return Err(RefreshError::validation_with_code(
                ErrorCode::VALIDATION_EMPTY_SCHEMA_LIST,
                "schema refresh requires at least one schema name",
                Some("schemas".to_string()),
            ));
        }

        let token = token.into();
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(RefreshError::validation_with_code(
                ErrorCode::VALIDATION_INVALID_INPUT,
                format!("invalid run token '{}'", token),
                Some("token".to_string()),
            ));
        }

        Ok(Self {
            mode,
            schemas,
            token,
        })
    }

    pub fn mode(&self) -> RefreshMode {
        self.mode
    }

    /// Schema names in input order; always empty in full mode
    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn dump_file(&self) -> String {
        format!("refresh_{}.dmp", self.token)
    }

    pub fn export_log(&self) -> String {
        format!("export_{}.log", self.token)
    }

    pub fn import_log(&self) -> String {
        format!("import_{}.log", self.token)
    }

    /// Spool file holding the grants captured for `schema` during this run
    pub fn grants_file(&self, schema: &str) -> String {
        format!("qa_{}_grants_{}.sql", schema, self.token)
    }
}

/// Split a comma separated list as typed by a user
pub fn split_schema_list(raw: &str) -> Vec<String> {
    raw.split(',').map(|s| s.trim().to_string()).collect()
}

fn normalize_schemas<I, S>(schemas: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();

    for raw in schemas {
        let name = raw.as_ref().trim().to_uppercase();
        if name.is_empty() {
            continue;
        }
        if !SCHEMA_NAME.is_match(&name) {
            return Err(RefreshError::validation_with_code(
                ErrorCode::VALIDATION_INVALID_SCHEMA_NAME,
                format!("'{}' is not a valid schema name", raw.as_ref().trim()),
                Some("schemas".to_string()),
            ));
        }
        if !normalized.contains(&name) {
            normalized.push(name);
        }
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_schemas_normalized_in_order() {
        let request =
            RefreshRequest::with_token(RefreshMode::Schema, [" app", "rpt ", "", "APP"], "t1")
                .unwrap();
        assert_eq!(request.schemas(), ["APP", "RPT"]);
    }

    #[test]
    fn test_schema_mode_requires_names() {
        let err = RefreshRequest::with_token(RefreshMode::Schema, [" ", ""], "t1").unwrap_err();
        assert_eq!(err.code(), ErrorCode::VALIDATION_EMPTY_SCHEMA_LIST);
    }

    #[test]
    fn test_full_mode_ignores_schemas() {
        let request = RefreshRequest::with_token(RefreshMode::Full, ["APP"], "t1").unwrap();
        assert!(request.schemas().is_empty());
    }

    #[test]
    fn test_rejects_injection_in_schema_name() {
        for bad in ["APP;DROP", "1APP", "a b", "APP'--"] {
            let err = RefreshRequest::with_token(RefreshMode::Schema, [bad], "t1").unwrap_err();
            assert_eq!(err.code(), ErrorCode::VALIDATION_INVALID_SCHEMA_NAME, "{bad}");
        }
        assert!(RefreshRequest::with_token(RefreshMode::Schema, ["HR$X#1"], "t1").is_ok());
    }

    #[test]
    fn test_artifact_names_share_token() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let request = RefreshRequest::with_timestamp(RefreshMode::Schema, ["app"], at).unwrap();
        assert_eq!(request.token(), "20240309_070501");
        assert_eq!(request.dump_file(), "refresh_20240309_070501.dmp");
        assert_eq!(request.export_log(), "export_20240309_070501.log");
        assert_eq!(request.import_log(), "import_20240309_070501.log");
        assert_eq!(request.grants_file("APP"), "qa_APP_grants_20240309_070501.sql");
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("FULL".parse::<RefreshMode>().unwrap(), RefreshMode::Full);
        assert_eq!("schema".parse::<RefreshMode>().unwrap(), RefreshMode::Schema);
        assert!("partial".parse::<RefreshMode>().is_err());
    }

    #[test]
    fn test_split_schema_list() {
        assert_eq!(split_schema_list("APP, RPT,,x"), vec!["APP", "RPT", "", "x"]);
    }
}
