//! Refresh state machine

use super::request::RefreshMode;
use std::fmt;

/// Position of a run in the refresh sequence
///
/// `GrantsBackedUp`, `SchemasPurged`, `GrantsRestored` and `PostRefreshDone`
/// are only visited in schema mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    SessionsVerified,
    Exported,
    Transferred,
    GrantsBackedUp,
    SchemasPurged,
    Imported,
    GrantsRestored,
    PostRefreshDone,
    Completed,
    Failed { step: String, reason: String },
}

impl RefreshState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RefreshState::Completed | RefreshState::Failed { .. })
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, RefreshState::Idle)
    }

    /// The state that follows this one on the success path
    pub fn next(&self, mode: RefreshMode) -> Option<RefreshState> {
        use RefreshState::*;

        let next = match (self, mode) {
            (Idle, _) => SessionsVerified,
            (SessionsVerified, _) => Exported,
            (Exported, _) => Transferred,
            (Transferred, RefreshMode::Schema) => GrantsBackedUp,
            (Transferred, RefreshMode::Full) => Imported,
            (GrantsBackedUp, RefreshMode::Schema) => SchemasPurged,
            (SchemasPurged, RefreshMode::Schema) => Imported,
            (Imported, RefreshMode::Schema) => GrantsRestored,
            (Imported, RefreshMode::Full) => Completed,
            (GrantsRestored, RefreshMode::Schema) => PostRefreshDone,
            (PostRefreshDone, RefreshMode::Schema) => Completed,
            _ => return None,
        };
        Some(next)
    }

    /// Whether moving to `to` is legal in `mode`
    pub fn can_transition(&self, to: &RefreshState, mode: RefreshMode) -> bool {
        match to {
            RefreshState::Failed { .. } => !self.is_terminal() && !self.is_idle(),
            RefreshState::Idle => true,
            _ => self.next(mode).as_ref() == Some(to),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RefreshState::Idle => "Idle",
            RefreshState::SessionsVerified => "SessionsVerified",
            RefreshState::Exported => "Exported",
            RefreshState::Transferred => "Transferred",
            RefreshState::GrantsBackedUp => "GrantsBackedUp",
            RefreshState::SchemasPurged => "SchemasPurged",
            RefreshState::Imported => "Imported",
            RefreshState::GrantsRestored => "GrantsRestored",
            RefreshState::PostRefreshDone => "PostRefreshDone",
            RefreshState::Completed => "Completed",
            RefreshState::Failed { .. } => "Failed",
        }
    }
}

impl fmt::Display for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshState::Failed { step, reason } => write!(f, "Failed at {}: {}", step, reason),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(mode: RefreshMode) -> Vec<&'static str> {
        let mut state = RefreshState::Idle;
        let mut names = vec![state.name()];
        while let Some(next) = state.next(mode) {
            state = next;
            names.push(state.name());
        }
        names
    }

    #[test]
    fn test_full_mode_path() {
        assert_eq!(
            walk(RefreshMode::Full),
            ["Idle", "SessionsVerified", "Exported", "Transferred", "Imported", "Completed"]
        );
    }

    #[test]
    fn test_schema_mode_path() {
        assert_eq!(
            walk(RefreshMode::Schema),
            [
                "Idle",
                "SessionsVerified",
                "Exported",
                "Transferred",
                "GrantsBackedUp",
                "SchemasPurged",
                "Imported",
                "GrantsRestored",
                "PostRefreshDone",
                "Completed"
            ]
        );
    }

    #[test]
    fn test_transitions() {
        let failed = RefreshState::Failed {
            step: "export".to_string(),
            reason: "ORA-".to_string(),
        };
        assert!(RefreshState::Exported.can_transition(&failed, RefreshMode::Full));
        assert!(!RefreshState::Completed.can_transition(&failed, RefreshMode::Full));
        assert!(!RefreshState::Transferred
            .can_transition(&RefreshState::GrantsBackedUp, RefreshMode::Full));
        assert!(!RefreshState::Exported.can_transition(&RefreshState::Imported, RefreshMode::Full));
        assert!(failed.can_transition(&RefreshState::Idle, RefreshMode::Full));
        assert!(failed.is_terminal());
        assert_eq!(failed.to_string(), "Failed at export: ORA-");
    }
}
