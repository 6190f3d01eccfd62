//! Run log shown to the operator
//!
//! Entries are scrubbed of secrets, appended in order, mirrored to
//! `tracing`, and pushed to a [`LogSink`] as they happen.

use super::redact::Redactor;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    /// A line of remote command output
    Output,
}

impl LogLevel {
    pub fn tag(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "OK",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Output => "OUT",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }

    /// `[HH:MM:SS] TAG message`
    pub fn render(&self) -> String {
        format!(
            "[{}] {:<5} {}",
            self.timestamp.format("%H:%M:%S"),
            self.level.tag(),
            self.message
        )
    }
}

/// Receives run log entries as they are appended
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn on_entry(&self, entry: &LogEntry);
}

pub struct NoOpSink;

#[async_trait]
impl LogSink for NoOpSink {
    async fn on_entry(&self, _entry: &LogEntry) {}
}

/// Prints entries to stdout; remote output lines only when verbose
pub struct ConsoleSink {
    show_output: bool,
}

impl ConsoleSink {
    pub fn new(show_output: bool) -> Self {
        Self { show_output }
    }
}

#[async_trait]
impl LogSink for ConsoleSink {
    async fn on_entry(&self, entry: &LogEntry) {
        if entry.level == LogLevel::Output && !self.show_output {
            return;
        }
        println!("{}", entry.render());
    }
}

/// Keeps every entry in memory
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn on_entry(&self, entry: &LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
    }
}

/// Ordered, append-only log of one refresh run
pub struct RunLog {
    entries: Vec<LogEntry>,
    redactor: Redactor,
    sink: Arc<dyn LogSink>,
}

impl RunLog {
    pub fn new(redactor: Redactor, sink: Arc<dyn LogSink>) -> Self {
        Self {
            entries: Vec::new(),
            redactor,
            sink,
        }
    }

    pub async fn push(&mut self, level: LogLevel, message: impl AsRef<str>) {
        let entry = LogEntry::new(level, self.redactor.redact(message.as_ref()));

        match level {
            LogLevel::Info | LogLevel::Success => tracing::info!("{}", entry.message),
            LogLevel::Warning => tracing::warn!("{}", entry.message),
            LogLevel::Error => tracing::error!("{}", entry.message),
            LogLevel::Output => tracing::trace!("{}", entry.message),
        }

        self.sink.on_entry(&entry).await;
        self.entries.push(entry);
    }

    pub async fn info(&mut self, message: impl AsRef<str>) {
        self.push(LogLevel::Info, message).await;
    }

    pub async fn success(&mut self, message: impl AsRef<str>) {
        self.push(LogLevel::Success, message).await;
    }

    pub async fn warning(&mut self, message: impl AsRef<str>) {
        self.push(LogLevel::Warning, message).await;
    }

    pub async fn error(&mut self, message: impl AsRef<str>) {
        self.push(LogLevel::Error, message).await;
    }

    pub async fn output(&mut self, line: impl AsRef<str>) {
        self.push(LogLevel::Output, line).await;
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.level == LogLevel::Warning)
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}
