//! Deciding whether a Data Pump step that "failed" really failed
//!
//! expdp and impdp write their progress banners and completion summary to
//! the error stream, so a non-empty stderr is not evidence of failure on its
//! own. The text is searched for known banner fragments instead. This is a
//! heuristic: a real failure that happens to contain an indicator is
//! accepted, and a benign run whose banners are all missing is rejected.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Export,
    Import,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Export => f.write_str("export"),
            OperationKind::Import => f.write_str("import"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    /// Reported failure, but the text looks like routine tool chatter
    BenignFailure,
    FatalFailure,
}

impl StepOutcome {
    /// Whether the run may continue past this step
    pub fn proceeds(&self) -> bool {
        !matches!(self, StepOutcome::FatalFailure)
    }
}

fn default_common() -> Vec<String> {
    to_strings(&[
        "successfully completed",
        "successfully loaded/unloaded",
        "successfully",
        "master table",
    ])
}

fn default_export() -> Vec<String> {
    to_strings(&["dump file set", "exported", "completed at"])
}

fn default_import() -> Vec<String> {
    to_strings(&["processing object type", "imported", "completed at"])
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Indicator substrings, configurable under `[refresh.indicators]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeIndicators {
    #[serde(default = "default_common")]
    pub common: Vec<String>,
    #[serde(default = "default_export")]
    pub export: Vec<String>,
    #[serde(default = "default_import")]
    pub import: Vec<String>,
}

impl Default for OutcomeIndicators {
    fn default() -> Self {
        Self {
            common: default_common(),
            export: default_export(),
            import: default_import(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutcomeClassifier {
    common: Vec<String>,
    export: Vec<String>,
    import: Vec<String>,
}

impl OutcomeClassifier {
    pub fn new(indicators: &OutcomeIndicators) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            common: lower(&indicators.common),
            export: lower(&indicators.export),
            import: lower(&indicators.import),
        }
    }

    /// Classify the error text of a failed export or import
    pub fn classify(&self, error_text: &str, kind: OperationKind) -> StepOutcome {
        match self.matching_indicator(error_text, kind) {
            Some(_) => StepOutcome::BenignFailure,
            None => StepOutcome::FatalFailure,
        }
    }

    /// First indicator found in `error_text`, for the log
    pub fn matching_indicator(&self, error_text: &str, kind: OperationKind) -> Option<&str> {
        let text = error_text.to_lowercase();
        let specific = match kind {
            OperationKind::Export => &self.export,
            OperationKind::Import => &self.import,
        };

        self.common
            .iter()
            .chain(specific.iter())
            .find(|indicator| text.contains(indicator.as_str()))
            .map(String::as_str)
    }
}

impl Default for OutcomeClassifier {
    fn default() -> Self {
        Self::new(&OutcomeIndicators::default())
    }
}
