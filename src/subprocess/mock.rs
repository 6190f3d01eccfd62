use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner, ProcessStream};

type CommandMatcher = Box<dyn Fn(&ProcessCommand) -> bool + Send + Sync>;

/// Scriptable stand-in for [`super::TokioProcessRunner`]
///
/// Expectations are tried in registration order; the first one whose program
/// and matcher fit the command answers it. Commands nobody expects fail with
/// [`ProcessError::MockExpectationNotMet`].
#[derive(Clone, Default)]
pub struct MockProcessRunner {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    expectations: Vec<MockExpectation>,
    history: Vec<ProcessCommand>,
}

struct MockExpectation {
    program: String,
    matcher: Option<CommandMatcher>,
    status: ExitStatus,
    stdout: String,
    stderr: String,
    limit: Option<usize>,
    calls: usize,
}

impl MockExpectation {
    fn accepts(&self, command: &ProcessCommand) -> bool {
        self.program == command.program
            && self.limit.map_or(true, |limit| self.calls < limit)
            && self.matcher.as_ref().map_or(true, |matcher| matcher(command))
    }
}

pub struct MockCommandConfig {
    runner: MockProcessRunner,
    expectation: MockExpectation,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_command(&mut self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                matcher: None,
                status: ExitStatus::Success,
                stdout: String::new(),
                stderr: String::new(),
                limit: None,
                calls: 0,
            },
        }
    }

    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        self.lock()
            .history
            .iter()
            .filter(|command| command.program == program)
            .count()
            == times
    }

    pub fn get_call_history(&self) -> Vec<ProcessCommand> {
        self.lock().history.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn respond(&self, command: &ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let mut state = self.lock();
        state.history.push(command.clone());

        let expectation = state
            .expectations
            .iter_mut()
            .find(|expectation| expectation.accepts(command))
            .ok_or_else(|| {
                ProcessError::MockExpectationNotMet(format!(
                    "no expectation for: {}",
                    command.display()
                ))
            })?;
        expectation.calls += 1;

        Ok(ProcessOutput {
            status: expectation.status,
            stdout: expectation.stdout.clone(),
            stderr: expectation.stderr.clone(),
            duration: Duration::from_millis(10),
        })
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let output = self.respond(&command)?;
        match (output.status, command.timeout) {
            (ExitStatus::Timeout, Some(limit)) => Err(ProcessError::Timeout(limit)),
            _ => Ok(output),
        }
    }

    async fn run_streaming(&self, command: ProcessCommand) -> Result<ProcessStream, ProcessError> {
        let output = self.respond(&command)?;
        let lines = |text: &str| -> Vec<Result<String, ProcessError>> {
            text.lines().map(|line| Ok(line.to_string())).collect()
        };
        let status = output.status;

        Ok(ProcessStream {
            stdout: Box::pin(futures::stream::iter(lines(&output.stdout))),
            stderr: Box::pin(futures::stream::iter(lines(&output.stderr))),
            status: Box::pin(async move { Ok(status) }),
        })
    }
}

impl MockCommandConfig {
    pub fn with_args<F>(self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.matching(move |command| matcher(&command.args))
    }

    /// Only answer commands whose stdin contains `needle`
    pub fn with_stdin_containing(self, needle: &str) -> Self {
        let needle = needle.to_string();
        self.matching(move |command| {
            command
                .stdin
                .as_deref()
                .is_some_and(|stdin| stdin.contains(&needle))
        })
    }

    fn matching<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&ProcessCommand) -> bool + Send + Sync + 'static,
    {
        self.expectation.matcher = Some(Box::new(matcher));
        self
    }

    pub fn returns_stdout(mut self, stdout: &str) -> Self {
        self.expectation.stdout = stdout.to_string();
        self
    }

    pub fn returns_stderr(mut self, stderr: &str) -> Self {
        self.expectation.stderr = stderr.to_string();
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.status = ExitStatus::from_code(code);
        self
    }

    pub fn returns_success(self) -> Self {
        self.returns_exit_code(0)
    }

    /// Behave like a command that outlived its timeout
    pub fn times_out(mut self) -> Self {
        self.expectation.status = ExitStatus::Timeout;
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.limit = Some(n);
        self
    }

    pub fn finish(self) {
        self.runner.lock().expectations.push(self.expectation);
    }
}
