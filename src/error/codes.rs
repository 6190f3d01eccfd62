/// Error code registry for pdb-refresh
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Connection errors
/// - 3000-3999: Session errors
/// - 4000-4999: Remote command errors
/// - 5000-5999: Workflow (state machine) errors
/// - 7000-7999: Validation errors
/// - 9000-9999: Other errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_TOML: u16 = 1002;
    pub const CONFIG_INVALID_JSON: u16 = 1003;
    pub const CONFIG_MISSING_REQUIRED: u16 = 1004;
    pub const CONFIG_MISSING_SECRET: u16 = 1005;
    pub const CONFIG_PATH_ERROR: u16 = 1006;
    pub const CONFIG_WRITE_FAILED: u16 = 1007;

    // Connection errors (2000-2999)
    pub const CONNECTION_GENERIC: u16 = 2000;
    pub const CONNECTION_CLIENT_NOT_FOUND: u16 = 2001;
    pub const CONNECTION_UNREACHABLE: u16 = 2002;
    pub const CONNECTION_REJECTED: u16 = 2003;

    // Session errors (3000-3999)
    pub const SESSION_GENERIC: u16 = 3000;
    pub const SESSION_DROPPED: u16 = 3001;
    pub const SESSION_TIMEOUT: u16 = 3002;
    pub const SESSION_IO_ERROR: u16 = 3003;
    pub const SESSION_SIGNAL_RECEIVED: u16 = 3004;

    // Remote command errors (4000-4999)
    pub const COMMAND_GENERIC: u16 = 4000;
    pub const COMMAND_EXPORT_FAILED: u16 = 4001;
    pub const COMMAND_DUMP_MISSING: u16 = 4002;
    pub const COMMAND_TRANSFER_FAILED: u16 = 4003;
    pub const COMMAND_PURGE_FAILED: u16 = 4004;
    pub const COMMAND_IMPORT_FAILED: u16 = 4005;

    // Workflow errors (5000-5999)
    pub const WORKFLOW_NOT_IDLE: u16 = 5001;
    pub const WORKFLOW_SESSION_MISSING: u16 = 5002;
    pub const WORKFLOW_INVALID_TRANSITION: u16 = 5003;

    // Validation errors (7000-7999)
    pub const VALIDATION_GENERIC: u16 = 7000;
    pub const VALIDATION_INVALID_SCHEMA_NAME: u16 = 7002;
    pub const VALIDATION_EMPTY_SCHEMA_LIST: u16 = 7003;
    pub const VALIDATION_INVALID_INPUT: u16 = 7004;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        // Configuration errors
        1000 => "Generic configuration error",
        1001 => "Configuration file not found",
        1002 => "Invalid TOML syntax in configuration",
        1003 => "Invalid JSON syntax in configuration",
        1004 => "Required configuration field is missing",
        1005 => "Required secret was not supplied",
        1006 => "Configuration path error",
        1007 => "Failed to write configuration",

        // Connection errors
        2000 => "Generic connection error",
        2001 => "SSH client program not found",
        2002 => "Remote host unreachable",
        2003 => "Remote host rejected the connection",

        // Session errors
        3000 => "Generic session error",
        3001 => "Remote session dropped",
        3002 => "Remote command timed out",
        3003 => "Session I/O error",
        3004 => "Session process received signal",

        // Remote command errors
        4000 => "Generic remote command error",
        4001 => "Export failed",
        4002 => "Dump file missing after export",
        4003 => "Dump file transfer failed",
        4004 => "Schema purge failed",
        4005 => "Import failed",

        // Workflow errors
        5001 => "Orchestrator is not idle",
        5002 => "Remote session handle missing",
        5003 => "Invalid state transition",

        // Validation errors
        7000 => "Generic validation error",
        7002 => "Invalid schema name",
        7003 => "Schema list is empty",
        7004 => "Invalid input",

        // Other errors
        9000 => "Generic error",

        _ => "Unknown error code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_ranges() {
        assert!(ErrorCode::CONFIG_GENERIC >= 1000 && ErrorCode::CONFIG_GENERIC < 2000);
        assert!(ErrorCode::CONNECTION_GENERIC >= 2000 && ErrorCode::CONNECTION_GENERIC < 3000);
        assert!(ErrorCode::SESSION_GENERIC >= 3000 && ErrorCode::SESSION_GENERIC < 4000);
        assert!(ErrorCode::COMMAND_GENERIC >= 4000 && ErrorCode::COMMAND_GENERIC < 5000);
        assert!(ErrorCode::WORKFLOW_NOT_IDLE >= 5000 && ErrorCode::WORKFLOW_NOT_IDLE < 6000);
        assert!(ErrorCode::VALIDATION_GENERIC >= 7000 && ErrorCode::VALIDATION_GENERIC < 8000);
        assert!(ErrorCode::OTHER_GENERIC >= 9000 && ErrorCode::OTHER_GENERIC < 10000);
    }

    #[test]
    fn test_error_code_descriptions() {
        assert_eq!(describe_error_code(1001), "Configuration file not found");
        assert_eq!(describe_error_code(4004), "Schema purge failed");
        assert_eq!(describe_error_code(65535), "Unknown error code");
    }
}
