//! Data Pump refresh of a QA database from production
//!
//! [`RefreshOrchestrator`] sequences the run. [`CommandBuilder`] writes the
//! remote scripts and [`OutcomeClassifier`] judges ambiguous Data Pump
//! results. [`RunLog`] records what happened.

pub mod classifier;
pub mod commands;
pub mod log;
pub mod orchestrator;
pub mod redact;
pub mod request;
pub mod state;

pub use classifier::{OperationKind, OutcomeClassifier, OutcomeIndicators, StepOutcome};
pub use commands::CommandBuilder;
pub use log::{ConsoleSink, LogEntry, LogLevel, LogSink, MemorySink, NoOpSink, RunLog};
pub use orchestrator::{RefreshOrchestrator, RefreshReport, RunContext, StepRecord, StepResult};
pub use redact::Redactor;
pub use request::{split_schema_list, RefreshMode, RefreshRequest};
pub use state::RefreshState;
