//! Remote shell sessions against the two database hosts
//!
//! The refresh core only sees [`RemoteSession`]. Production sessions go
//! through the system `ssh` client ([`OpenSshSession`]); tests use
//! [`MockRemoteSession`].

use crate::config::{EndpointConfig, EndpointRole};
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::Stream;
use std::future::Future;
use std::pin::Pin;

pub mod environment;
pub mod mock;
pub mod openssh;

pub use environment::{EnvironmentResolver, RemoteEnvironment};
pub use mock::{MockConnector, MockRemoteSession, MockResponse};
pub use openssh::{OpenSshConnector, OpenSshSession};

/// Captured result of one remote script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl RemoteOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Zero exit status and nothing on the error stream
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && self.stderr.trim().is_empty()
    }
}

pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;
pub type ExitFuture = Pin<Box<dyn Future<Output = Result<i32>> + Send>>;

/// Output of a running remote script, line by line as it arrives
pub struct RemoteStream {
    pub stdout: LineStream,
    pub stderr: LineStream,
    pub exit: ExitFuture,
}

#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Human readable `ROLE user@host`
    fn label(&self) -> &str;

    fn host(&self) -> &str;

    /// Run a script to completion and capture both streams
    async fn execute(&self, script: &str) -> Result<RemoteOutput>;

    /// Run a script and hand back its output as it is produced
    async fn execute_streaming(&self, script: &str) -> Result<RemoteStream>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(
        &self,
        role: EndpointRole,
        endpoint: &EndpointConfig,
    ) -> Result<Box<dyn RemoteSession>>;
}

pub(crate) fn session_label(role: EndpointRole, endpoint: &EndpointConfig) -> String {
    format!("{} {}@{}", role.label(), endpoint.ssh_user, endpoint.host)
}
