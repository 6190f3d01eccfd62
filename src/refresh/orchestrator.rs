//! Sequencing of a refresh run
//!
//! ```text
//! Idle -> SessionsVerified -> Exported -> Transferred
//!      [-> GrantsBackedUp -> SchemasPurged]       (schema mode)
//!      -> Imported
//!      [-> GrantsRestored -> PostRefreshDone]     (schema mode)
//!      -> Completed
//! ```
//!
//! Any fatal error moves the run to `Failed`. Grant backup, grant restore
//! and post-refresh maintenance only ever produce warnings. A failed purge
//! is fatal so the import never runs into a half-cleaned schema.

use super::classifier::{OperationKind, OutcomeClassifier, StepOutcome};
use super::commands::{marker_warnings, sqlplus_errors, CommandBuilder};
use super::log::{LogEntry, LogSink, RunLog};
use super::redact::Redactor;
use super::request::RefreshRequest;
use super::state::RefreshState;
use crate::config::{EndpointRole, RefreshConfig};
use crate::error::{ErrorCode, RefreshError, Result};
use crate::remote::{EnvironmentResolver, RemoteEnvironment, RemoteSession, RemoteStream};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of one remote command
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step: String,
    pub succeeded: bool,
    pub output: String,
    pub error: String,
    pub exit_code: i32,
    pub outcome: StepOutcome,
}

impl StepResult {
    /// Remote error text for messages: stderr, else SQL*Plus errors, else stdout
    pub fn error_text(&self) -> String {
        let stderr = self.error.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let sql_errors = sqlplus_errors(&self.output);
        if !sql_errors.is_empty() {
            return sql_errors.join("\n");
        }
        let stdout = self.output.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("exit status {}", self.exit_code)
    }
}

/// Step label and how it ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: String,
    pub outcome: StepOutcome,
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub token: String,
    pub warnings: Vec<String>,
    pub steps: Vec<StepRecord>,
    pub duration: Duration,
}

impl RefreshReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

enum Channel {
    Stdout,
    Stderr,
}

/// Everything one run needs, passed to every step
pub struct RunContext<'a> {
    source: &'a dyn RemoteSession,
    target: &'a dyn RemoteSession,
    request: &'a RefreshRequest,
    commands: CommandBuilder<'a>,
    classifier: OutcomeClassifier,
    resolver: EnvironmentResolver,
    environments: HashMap<EndpointRole, RemoteEnvironment>,
    state: RefreshState,
    current_step: String,
    log: RunLog,
    warnings: Vec<String>,
    steps: Vec<StepRecord>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        source: &'a dyn RemoteSession,
        target: &'a dyn RemoteSession,
        config: &'a RefreshConfig,
        request: &'a RefreshRequest,
        log: RunLog,
    ) -> Self {
        Self {
            source,
            target,
            request,
            commands: CommandBuilder::new(&config.source, &config.target, request, &config.refresh),
            classifier: OutcomeClassifier::new(&config.refresh.indicators),
            resolver: EnvironmentResolver,
            environments: HashMap::new(),
            state: RefreshState::Idle,
            current_step: "verify sessions".to_string(),
            log,
            warnings: Vec::new(),
            steps: Vec::new(),
        }
    }

    fn session(&self, role: EndpointRole) -> &'a dyn RemoteSession {
        match role {
            EndpointRole::Source => self.source,
            EndpointRole::Target => self.target,
        }
    }

    fn advance(&mut self, next: RefreshState) -> Result<()> {
        if !self.state.can_transition(&next, self.request.mode()) {
            return Err(RefreshError::workflow(
                ErrorCode::WORKFLOW_INVALID_TRANSITION,
                format!("cannot move from {} to {}", self.state, next),
            ));
        }
        tracing::debug!("Refresh state {} -> {}", self.state.name(), next.name());
        self.state = next;
        Ok(())
    }

    async fn warn(&mut self, message: String) {
        let message = self.log.redactor().redact(&message);
        self.log.warning(&message).await;
        self.warnings.push(message);
    }

    fn fatal(&self, code: u16, step: &str, result: &StepResult) -> RefreshError {
        RefreshError::command(code, self.log.redactor().redact(&result.error_text()), step)
            .with_exit_code(result.exit_code)
    }

    /// Remote environment of `role`, resolved on first use
    async fn environment(&mut self, role: EndpointRole) -> Result<RemoteEnvironment> {
        if let Some(env) = self.environments.get(&role) {
            return Ok(env.clone());
        }

        let session = self.session(role);
        self.log
            .info(format!("Resolving database environment on {}", session.label()))
            .await;
        let env = self
            .resolver
            .resolve(session)
            .await
            .map_err(|e| e.with_context(format!("resolving environment on {}", session.label())))?;

        if env.is_empty() {
            self.log
                .info(format!(
                    "No database variables found on {}; using empty values",
                    session.label()
                ))
                .await;
        }
        self.environments.insert(role, env.clone());
        Ok(env)
    }

    /// Submit a script, stream its output into the log and wait for it to exit
    async fn run_step(&mut self, role: EndpointRole, step: &str, script: String) -> Result<StepResult> {
        let session = self.session(role);
        self.current_step = step.to_string();
        self.log
            .info(format!("Starting {} on {}", step, session.label()))
            .await;
        tracing::debug!("Submitting {} ({} bytes) to {}", step, script.len(), session.label());

        let started = Instant::now();
        let RemoteStream {
            stdout,
            stderr,
            exit,
        } = session.execute_streaming(&script).await?;

        let mut merged = futures::stream::select(
            stdout.map(|line| (Channel::Stdout, line)),
            stderr.map(|line| (Channel::Stderr, line)),
        );

        let mut output = String::new();
        let mut error = String::new();
        while let Some((channel, line)) = merged.next().await {
            let line = line?;
            self.log.output(&line).await;
            let buffer = match channel {
                Channel::Stdout => &mut output,
                Channel::Stderr => &mut error,
            };
            buffer.push_str(&line);
            buffer.push('\n');
        }
        let exit_code = exit.await?;

        let succeeded = exit_code == 0 && error.trim().is_empty();
        tracing::trace!(
            "{} exited {} after {:?} (stdout {} bytes, stderr {} bytes)",
            step,
            exit_code,
            started.elapsed(),
            output.len(),
            error.len()
        );

        Ok(StepResult {
            step: step.to_string(),
            succeeded,
            output,
            error,
            exit_code,
            outcome: if succeeded {
                StepOutcome::Success
            } else {
                StepOutcome::FatalFailure
            },
        })
    }

    fn record(&mut self, step: &str, outcome: StepOutcome) {
        self.steps.push(StepRecord {
            step: step.to_string(),
            outcome,
        });
    }

    async fn verify_sessions(&mut self) -> Result<()> {
        self.log
            .info(format!(
                "Refreshing {} from {} ({} mode, run {})",
                self.target.label(),
                self.source.label(),
                self.request.mode(),
                self.request.token()
            ))
            .await;
        self.advance(RefreshState::SessionsVerified)
    }

    /// Export and Import share the same accept/abort rule
    async fn data_pump(&mut self, kind: OperationKind) -> Result<()> {
        let (role, step, code) = match kind {
            OperationKind::Export => (EndpointRole::Source, "export", ErrorCode::COMMAND_EXPORT_FAILED),
            OperationKind::Import => (EndpointRole::Target, "import", ErrorCode::COMMAND_IMPORT_FAILED),
        };

        let env = self.environment(role).await?;
        let script = match kind {
            OperationKind::Export => self.commands.export(&env)?,
            OperationKind::Import => self.commands.import(&env)?,
        };
        let mut result = self.run_step(role, step, script).await?;

        if !result.succeeded {
            result.outcome = self.classifier.classify(&result.error, kind);
            if !result.outcome.proceeds() {
                self.record(step, result.outcome);
                return Err(self.fatal(code, step, &result));
            }
            let indicator = self
                .classifier
                .matching_indicator(&result.error, kind)
                .unwrap_or_default()
                .to_string();
            self.log
                .info(format!(
                    "{} reported messages on stderr (matched \"{}\"); treating as success",
                    step, indicator
                ))
                .await;
        }

        self.record(step, result.outcome);
        self.log.success(format!("{} finished", step)).await;
        Ok(())
    }

    async fn export(&mut self) -> Result<()> {
        self.data_pump(OperationKind::Export).await?;

        let env = self.environment(EndpointRole::Source).await?;
        let script = self.commands.verify_dump(&env);
        let result = self.run_step(EndpointRole::Source, "verify dump", script).await?;
        if !result.succeeded {
            self.record("verify dump", StepOutcome::FatalFailure);
            return Err(self.fatal(ErrorCode::COMMAND_DUMP_MISSING, "verify dump", &result));
        }
        self.record("verify dump", StepOutcome::Success);
        self.log
            .success(format!("Dump file {} is in place", self.request.dump_file()))
            .await;

        self.advance(RefreshState::Exported)
    }

    async fn transfer(&mut self) -> Result<()> {
        let source_env = self.environment(EndpointRole::Source).await?;
        let script = self.commands.transfer(&source_env);
        let result = self.run_step(EndpointRole::Source, "transfer", script).await?;
        if !result.succeeded {
            self.record("transfer", StepOutcome::FatalFailure);
            return Err(self.fatal(ErrorCode::COMMAND_TRANSFER_FAILED, "transfer", &result));
        }
        self.record("transfer", StepOutcome::Success);

        let target_env = self.environment(EndpointRole::Target).await?;
        let script = self.commands.target_permissions(&target_env);
        let result = self
            .run_step(EndpointRole::Target, "dump permissions", script)
            .await?;
        if !result.succeeded {
            self.record("dump permissions", StepOutcome::FatalFailure);
            return Err(self.fatal(
                ErrorCode::COMMAND_TRANSFER_FAILED,
                "dump permissions",
                &result,
            ));
        }
        self.record("dump permissions", StepOutcome::Success);
        self.log.success("Dump file transferred to target").await;

        self.advance(RefreshState::Transferred)
    }

    async fn backup_grants(&mut self) -> Result<()> {
        let env = self.environment(EndpointRole::Target).await?;

        let request = self.request;
        for schema in request.schemas() {
            let step = format!("grant backup {}", schema);
            let script = self.commands.grant_backup(&env, schema)?;
            let result = self.run_step(EndpointRole::Target, &step, script).await?;
            if result.succeeded {
                self.record(&step, StepOutcome::Success);
                self.log
                    .success(format!(
                        "Grants of {} saved to {}",
                        schema,
                        request.grants_file(schema)
                    ))
                    .await;
            } else {
                self.record(&step, StepOutcome::FatalFailure);
                self.warn(format!(
                    "Grant backup for {} failed: {}",
                    schema,
                    result.error_text()
                ))
                .await;
            }
        }

        self.advance(RefreshState::GrantsBackedUp)
    }

    async fn purge_schemas(&mut self) -> Result<()> {
        let env = self.environment(EndpointRole::Target).await?;

        let request = self.request;
        for schema in request.schemas() {
            let step = format!("purge {}", schema);
            let script = self.commands.purge(&env, schema)?;
            let result = self.run_step(EndpointRole::Target, &step, script).await?;

            for warning in marker_warnings(&result.output) {
                self.warn(format!("Purge of {}: {}", schema, warning)).await;
            }

            if !result.succeeded {
                self.record(&step, StepOutcome::FatalFailure);
                return Err(self.fatal(ErrorCode::COMMAND_PURGE_FAILED, &step, &result));
            }
            self.record(&step, StepOutcome::Success);
            self.log.success(format!("Schema {} purged", schema)).await;
        }

        self.advance(RefreshState::SchemasPurged)
    }

    async fn import(&mut self) -> Result<()> {
        self.data_pump(OperationKind::Import).await?;
        self.advance(RefreshState::Imported)
    }

    async fn restore_grants(&mut self) -> Result<()> {
        let env = self.environment(EndpointRole::Target).await?;

        let request = self.request;
        for schema in request.schemas() {
            let step = format!("grant restore {}", schema);
            let script = self.commands.grant_restore(&env, schema)?;
            let result = self.run_step(EndpointRole::Target, &step, script).await?;

            if !result.succeeded {
                self.record(&step, StepOutcome::FatalFailure);
                self.warn(format!(
                    "Grant restore for {} failed: {}",
                    schema,
                    result.error_text()
                ))
                .await;
                continue;
            }

            let errors = sqlplus_errors(&result.output);
            for error in &errors {
                self.warn(format!("Grant restore for {}: {}", schema, error))
                    .await;
            }
            self.record(&step, StepOutcome::Success);
            if errors.is_empty() {
                self.log
                    .success(format!("Grants of {} restored", schema))
                    .await;
            }
        }

        self.advance(RefreshState::GrantsRestored)
    }

    async fn post_refresh(&mut self) -> Result<()> {
        let env = self.environment(EndpointRole::Target).await?;
        let step = "post-refresh maintenance";
        let script = self.commands.post_refresh(&env)?;
        let result = self.run_step(EndpointRole::Target, step, script).await?;

        for warning in marker_warnings(&result.output) {
            self.warn(format!("Post-refresh: {}", warning)).await;
        }

        if result.succeeded {
            self.record(step, StepOutcome::Success);
            self.log
                .success("Invalid objects recompiled and statistics gathered")
                .await;
        } else {
            self.record(step, StepOutcome::FatalFailure);
            self.warn(format!(
                "Post-refresh maintenance failed: {}",
                result.error_text()
            ))
            .await;
        }

        self.advance(RefreshState::PostRefreshDone)
    }

    /// Drive the run from `Idle` to `Completed`
    pub async fn run(&mut self) -> Result<()> {
        self.verify_sessions().await?;
        self.export().await?;
        self.transfer().await?;

        if self.request.mode().is_schema() {
            self.backup_grants().await?;
            self.purge_schemas().await?;
        }

        self.import().await?;

        if self.request.mode().is_schema() {
            self.restore_grants().await?;
            self.post_refresh().await?;
        }

        self.advance(RefreshState::Completed)
    }
}

/// Owns the two sessions of a refresh and runs it
pub struct RefreshOrchestrator {
    source: Option<Box<dyn RemoteSession>>,
    target: Option<Box<dyn RemoteSession>>,
    state: RefreshState,
    log: Vec<LogEntry>,
}

impl Default for RefreshOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshOrchestrator {
    pub fn new() -> Self {
        Self {
            source: None,
            target: None,
            state: RefreshState::Idle,
            log: Vec::new(),
        }
    }

    pub fn with_sessions(source: Box<dyn RemoteSession>, target: Box<dyn RemoteSession>) -> Self {
        let mut orchestrator = Self::new();
        orchestrator.attach(EndpointRole::Source, source);
        orchestrator.attach(EndpointRole::Target, target);
        orchestrator
    }

    /// Hand an established session to the orchestrator
    pub fn attach(&mut self, role: EndpointRole, session: Box<dyn RemoteSession>) {
        match role {
            EndpointRole::Source => self.source = Some(session),
            EndpointRole::Target => self.target = Some(session),
        }
    }

    pub fn state(&self) -> &RefreshState {
        &self.state
    }

    /// Entries of the most recent run
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Make the orchestrator ready for another run
    pub fn reset(&mut self) {
        self.state = RefreshState::Idle;
        self.log.clear();
    }

    /// Run a refresh to completion
    ///
    /// Returns the report of a completed run, possibly with warnings, or the
    /// fatal error that aborted it. Either way the log entries stay
    /// available through [`RefreshOrchestrator::log`].
    pub async fn start_refresh(
        &mut self,
        config: &RefreshConfig,
        request: &RefreshRequest,
        sink: Arc<dyn LogSink>,
    ) -> Result<RefreshReport> {
        if !self.state.is_idle() {
            return Err(RefreshError::workflow(
                ErrorCode::WORKFLOW_NOT_IDLE,
                format!("refresh already ran (state {}); reset first", self.state),
            ));
        }
        config.validate()?;

        let redactor = Redactor::new(
            config
                .source
                .secrets()
                .into_iter()
                .chain(config.target.secrets()),
        );
        let mut log = RunLog::new(redactor, sink);
        let started = Instant::now();

        let (source, target) = match (self.source.as_deref(), self.target.as_deref()) {
            (Some(source), Some(target)) => (source, target),
            (source, _) => {
                let missing = if source.is_none() { "source" } else { "target" };
                let err = RefreshError::workflow(
                    ErrorCode::WORKFLOW_SESSION_MISSING,
                    format!("no {} session attached", missing),
                );
                log.error(err.user_message()).await;
                self.state = RefreshState::Failed {
                    step: "verify sessions".to_string(),
                    reason: err.to_string(),
                };
                self.log = log.into_entries();
                return Err(err);
            }
        };

        let mut ctx = RunContext::new(source, target, config, request, log);
        let outcome = ctx.run().await;

        let result = match outcome {
            Ok(()) => {
                let message = match ctx.warnings.len() {
                    0 => "Refresh completed".to_string(),
                    n => format!("Refresh completed with {} warning(s)", n),
                };
                ctx.log.success(message).await;
                Ok(RefreshReport {
                    token: request.token().to_string(),
                    warnings: ctx.warnings,
                    steps: ctx.steps,
                    duration: started.elapsed(),
                })
            }
            Err(err) => {
                let step = err.step().unwrap_or(&ctx.current_step).to_string();
                ctx.log
                    .error(format!("Refresh aborted: {}", err.user_message()))
                    .await;
                ctx.state = RefreshState::Failed {
                    step,
                    reason: err.to_string(),
                };
                Err(err)
            }
        };

        self.state = ctx.state;
        self.log = ctx.log.into_entries();
        result
    }

    /// Close and drop both sessions
    pub async fn close_sessions(&mut self) -> Result<()> {
        for session in [self.source.take(), self.target.take()].into_iter().flatten() {
            if let Err(e) = session.close().await {
                tracing::warn!("Failed to close {}: {}", session.label(), e);
            }
        }
        Ok(())
    }
}
