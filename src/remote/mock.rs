//! Scriptable in-memory session for tests and dry runs

use super::{RemoteConnector, RemoteOutput, RemoteSession, RemoteStream};
use crate::config::{EndpointConfig, EndpointRole};
use crate::error::{ErrorCode, RefreshError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// What a matched script produces
#[derive(Debug, Clone)]
pub enum MockResponse {
    Output(RemoteOutput),
    /// The connection drops while the script runs
    Dropped,
}

struct MockExpectation {
    #[allow(clippy::type_complexity)]
    matcher: Box<dyn Fn(&str) -> bool + Send + Sync>,
    response: MockResponse,
    times_called: usize,
    expected_times: Option<usize>,
}

#[derive(Default)]
struct MockState {
    expectations: Vec<MockExpectation>,
    history: Vec<String>,
    closed: bool,
}

/// Fake [`RemoteSession`]
///
/// Scripts are matched against expectations in registration order; the
/// first matching expectation with calls left answers. Unmatched scripts
/// succeed with empty output unless the session is strict.
#[derive(Clone)]
pub struct MockRemoteSession {
    label: String,
    host: String,
    strict: bool,
    state: Arc<Mutex<MockState>>,
}

pub struct MockScriptConfig {
    session: MockRemoteSession,
    expectation: MockExpectation,
}

impl MockRemoteSession {
    pub fn new(label: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            host: host.into(),
            strict: false,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Fail scripts that match no expectation
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Expect a script containing `needle`
    pub fn expect_containing(&self, needle: &str) -> MockScriptConfig {
        let needle = needle.to_string();
        self.expect_script(move |script| script.contains(&needle))
    }

    pub fn expect_script<F>(&self, matcher: F) -> MockScriptConfig
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        MockScriptConfig {
            session: self.clone(),
            expectation: MockExpectation {
                matcher: Box::new(matcher),
                response: MockResponse::Output(RemoteOutput::default()),
                times_called: 0,
                expected_times: None,
            },
        }
    }

    /// Every script submitted so far, in order
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Scripts in the history containing `needle`
    pub fn calls_containing(&self, needle: &str) -> Vec<String> {
        self.history()
            .into_iter()
            .filter(|script| script.contains(needle))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn respond(&self, script: &str) -> Result<RemoteOutput> {
        let mut state = self.lock();
        if state.closed {
            return Err(RefreshError::session(
                ErrorCode::SESSION_DROPPED,
                "session already closed",
                Some(self.host.clone()),
            ));
        }
        state.history.push(script.to_string());

        let matched = state.expectations.iter_mut().find(|expectation| {
            let exhausted = expectation
                .expected_times
                .is_some_and(|limit| expectation.times_called >= limit);
            !exhausted && (expectation.matcher)(script)
        });

        match matched {
            Some(expectation) => {
                expectation.times_called += 1;
                match &expectation.response {
                    MockResponse::Output(output) => Ok(output.clone()),
                    MockResponse::Dropped => Err(RefreshError::session(
                        ErrorCode::SESSION_DROPPED,
                        "connection closed by remote host",
                        Some(self.host.clone()),
                    )),
                }
            }
            None if self.strict => Err(RefreshError::session(
                ErrorCode::SESSION_GENERIC,
                format!("unexpected script on {}: {}", self.label, first_line(script)),
                Some(self.host.clone()),
            )),
            None => Ok(RemoteOutput::default()),
        }
    }
}

fn first_line(script: &str) -> &str {
    script.lines().next().unwrap_or_default()
}

#[async_trait]
impl RemoteSession for MockRemoteSession {
    fn label(&self) -> &str {
        &self.label
    }

    fn host(&self) -> &str {
        &self.host
    }

    async fn execute(&self, script: &str) -> Result<RemoteOutput> {
        self.respond(script)
    }

    async fn execute_streaming(&self, script: &str) -> Result<RemoteStream> {
        let output = self.respond(script)?;
        let lines = |text: String| -> Vec<Result<String>> {
            text.lines().map(|line| Ok(line.to_string())).collect()
        };
        let exit_code = output.exit_code;

        Ok(RemoteStream {
            stdout: Box::pin(futures::stream::iter(lines(output.stdout))),
            stderr: Box::pin(futures::stream::iter(lines(output.stderr))),
            exit: Box::pin(async move { Ok(exit_code) }),
        })
    }

    async fn close(&self) -> Result<()> {
        self.lock().closed = true;
        Ok(())
    }
}

impl MockScriptConfig {
    pub fn returns(mut self, stdout: &str, stderr: &str, exit_code: i32) -> Self {
        self.expectation.response = MockResponse::Output(RemoteOutput::new(stdout, stderr, exit_code));
        self
    }

    pub fn returns_stdout(self, stdout: &str) -> Self {
        self.returns(stdout, "", 0)
    }

    pub fn returns_stderr(self, stderr: &str) -> Self {
        self.returns("", stderr, 0)
    }

    pub fn returns_failure(self, stderr: &str, exit_code: i32) -> Self {
        self.returns("", stderr, exit_code)
    }

    pub fn drops_connection(mut self) -> Self {
        self.expectation.response = MockResponse::Dropped;
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.expected_times = Some(n);
        self
    }

    pub fn finish(self) {
        self.session.lock().expectations.push(self.expectation);
    }
}

/// Hands out pre-built [`MockRemoteSession`]s by role
#[derive(Clone, Default)]
pub struct MockConnector {
    sessions: Arc<Mutex<HashMap<&'static str, MockRemoteSession>>>,
    refused: Arc<Mutex<Vec<&'static str>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, role: EndpointRole, session: MockRemoteSession) -> Self {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(role.section(), session);
        }
        self
    }

    /// Make `connect` fail for this role as an unreachable host would
    pub fn refusing(self, role: EndpointRole) -> Self {
        if let Ok(mut refused) = self.refused.lock() {
            refused.push(role.section());
        }
        self
    }
}

#[async_trait]
impl RemoteConnector for MockConnector {
    async fn connect(
        &self,
        role: EndpointRole,
        endpoint: &EndpointConfig,
    ) -> Result<Box<dyn RemoteSession>> {
        let refused = self
            .refused
            .lock()
            .map(|refused| refused.contains(&role.section()))
            .unwrap_or(false);
        if refused {
            return Err(RefreshError::connection(
                ErrorCode::CONNECTION_UNREACHABLE,
                "connection refused",
                Some(endpoint.host.clone()),
            ));
        }

        let session = self
            .sessions
            .lock()
            .ok()
            .and_then(|sessions| sessions.get(role.section()).cloned())
            .unwrap_or_else(|| {
                MockRemoteSession::new(super::session_label(role, endpoint), endpoint.host.clone())
            });
        Ok(Box::new(session))
    }
}
