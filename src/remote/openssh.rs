use super::{session_label, RemoteConnector, RemoteOutput, RemoteSession, RemoteStream};
use crate::config::{EndpointConfig, EndpointRole, Secret};
use crate::error::{ErrorCode, RefreshError, Result};
use crate::subprocess::{ExitStatus, ProcessCommand, ProcessCommandBuilder, ProcessRunner};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// ssh reports its own failures (not the remote command's) with this status
const SSH_TRANSPORT_FAILURE: i32 = 255;
/// sshpass: the password was rejected
const SSHPASS_BAD_PASSWORD: i32 = 5;
const CONNECT_TIMEOUT_SECS: u32 = 30;

/// Session backed by the system OpenSSH client
///
/// Every script is fed to `bash -s` on stdin. When a shell password is
/// configured `sshpass -e` supplies it through `SSHPASS`.
pub struct OpenSshSession {
    label: String,
    host: String,
    port: u16,
    user: String,
    password: Option<Secret>,
    timeout: Option<Duration>,
    runner: Arc<dyn ProcessRunner>,
    closed: AtomicBool,
}

impl OpenSshSession {
    pub fn new(
        role: EndpointRole,
        endpoint: &EndpointConfig,
        runner: Arc<dyn ProcessRunner>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            label: session_label(role, endpoint),
            host: endpoint.host.clone(),
            port: endpoint.port,
            user: endpoint.ssh_user.clone(),
            password: endpoint.ssh_password.clone(),
            timeout,
            runner,
            closed: AtomicBool::new(false),
        }
    }

    fn build_command(&self, script: &str) -> ProcessCommand {
        let builder = match &self.password {
            Some(password) => ProcessCommandBuilder::new("sshpass")
                .args(["-e", "ssh"])
                .ssh_option("NumberOfPasswordPrompts", 1)
                .env("SSHPASS", password.expose()),
            None => ProcessCommandBuilder::new("ssh").ssh_option("BatchMode", "yes"),
        };

        builder
            .ssh_option("StrictHostKeyChecking", "accept-new")
            .ssh_option("ConnectTimeout", CONNECT_TIMEOUT_SECS)
            .arg("-p")
            .arg(self.port.to_string())
            .arg(format!("{}@{}", self.user, self.host))
            .args(["bash", "-s"])
            .stdin_script(script)
            .maybe_timeout(self.timeout)
            .build()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RefreshError::session(
                ErrorCode::SESSION_DROPPED,
                "session already closed",
                Some(self.host.clone()),
            ));
        }
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        let output = self
            .runner
            .run(self.build_command("true"))
            .await
            .map_err(|e| RefreshError::from(e).with_host(self.host.clone()))?;

        match output.status {
            ExitStatus::Success => Ok(()),
            ExitStatus::Error(SSHPASS_BAD_PASSWORD) if self.password.is_some() => {
                Err(RefreshError::connection(
                    ErrorCode::CONNECTION_REJECTED,
                    "authentication rejected",
                    Some(self.host.clone()),
                ))
            }
            other => Err(RefreshError::connection(
                ErrorCode::CONNECTION_UNREACHABLE,
                describe_failure(&other, &output.stderr),
                Some(self.host.clone()),
            )),
        }
    }
}

fn describe_failure(status: &ExitStatus, stderr: &str) -> String {
    let detail = stderr.trim();
    let status = match status {
        ExitStatus::Success => "success".to_string(),
        ExitStatus::Error(code) => format!("exit status {}", code),
        ExitStatus::Timeout => "timed out".to_string(),
        ExitStatus::Signal(sig) => format!("signal {}", sig),
    };
    if detail.is_empty() {
        status
    } else {
        format!("{}: {}", status, detail)
    }
}

/// Translate the local ssh status into the remote exit code
fn remote_exit_code(status: ExitStatus, host: &str, stderr: &str) -> Result<i32> {
    match status {
        ExitStatus::Success => Ok(0),
        ExitStatus::Error(SSH_TRANSPORT_FAILURE) => Err(RefreshError::session(
            ErrorCode::SESSION_DROPPED,
            describe_failure(&status, stderr),
            Some(host.to_string()),
        )),
        ExitStatus::Error(code) => Ok(code),
        ExitStatus::Timeout => Err(RefreshError::session(
            ErrorCode::SESSION_TIMEOUT,
            "remote command timed out",
            Some(host.to_string()),
        )),
        ExitStatus::Signal(sig) => Err(RefreshError::session(
            ErrorCode::SESSION_SIGNAL_RECEIVED,
            format!("ssh client terminated by signal {}", sig),
            Some(host.to_string()),
        )),
    }
}

#[async_trait]
impl RemoteSession for OpenSshSession {
    fn label(&self) -> &str {
        &self.label
    }

    fn host(&self) -> &str {
        &self.host
    }

    async fn execute(&self, script: &str) -> Result<RemoteOutput> {
        self.ensure_open()?;
        tracing::debug!("Executing script on {} ({} bytes)", self.label, script.len());

        let output = self
            .runner
            .run(self.build_command(script))
            .await
            .map_err(|e| RefreshError::from(e).with_host(self.host.clone()))?;

        let exit_code = remote_exit_code(output.status, &self.host, &output.stderr)?;
        tracing::trace!(
            "{} exited {} (stdout {} bytes, stderr {} bytes)",
            self.label,
            exit_code,
            output.stdout.len(),
            output.stderr.len()
        );

        Ok(RemoteOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code,
        })
    }

    async fn execute_streaming(&self, script: &str) -> Result<RemoteStream> {
        self.ensure_open()?;
        tracing::debug!("Streaming script on {} ({} bytes)", self.label, script.len());

        let stream = self
            .runner
            .run_streaming(self.build_command(script))
            .await
            .map_err(|e| RefreshError::from(e).with_host(self.host.clone()))?;

        let host = self.host.clone();
        let status = stream.status;
        let exit = Box::pin(async move {
            let status = status
                .await
                .map_err(|e| RefreshError::from(e).with_host(host.clone()))?;
            remote_exit_code(status, &host, "")
        });

        Ok(RemoteStream {
            stdout: Box::pin(stream.stdout.map(|line| line.map_err(RefreshError::from))),
            stderr: Box::pin(stream.stderr.map(|line| line.map_err(RefreshError::from))),
            exit,
        })
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Closed session {}", self.label);
        }
        Ok(())
    }
}

/// Opens [`OpenSshSession`]s and checks each with a no-op command
#[derive(Clone)]
pub struct OpenSshConnector {
    runner: Arc<dyn ProcessRunner>,
    timeout: Option<Duration>,
}

impl OpenSshConnector {
    pub fn new(runner: Arc<dyn ProcessRunner>, timeout: Option<Duration>) -> Self {
        Self { runner, timeout }
    }
}

#[async_trait]
impl RemoteConnector for OpenSshConnector {
    async fn connect(
        &self,
        role: EndpointRole,
        endpoint: &EndpointConfig,
    ) -> Result<Box<dyn RemoteSession>> {
        let session = OpenSshSession::new(role, endpoint, Arc::clone(&self.runner), self.timeout);
        tracing::info!("Connecting to {}", session.label());
        session.probe().await?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RefreshConfig;
    use crate::subprocess::SubprocessManager;

    fn endpoint(password: Option<&str>) -> EndpointConfig {
        let mut endpoint = RefreshConfig::template().source;
        endpoint.ssh_password = password.map(Secret::new);
        endpoint
    }

    #[test]
    fn test_password_goes_through_environment() {
        let (manager, _mock) = SubprocessManager::mock();
        let session = OpenSshSession::new(
            EndpointRole::Source,
            &endpoint(Some("s3cret")),
            manager.runner(),
            None,
        );

        let command = session.build_command("hostname");
        assert_eq!(command.program, "sshpass");
        assert_eq!(command.env.get("SSHPASS"), Some(&"s3cret".to_string()));
        assert!(!command.args.iter().any(|a| a.contains("s3cret")));
        assert_eq!(
            &command.args[command.args.len() - 3..],
            ["oracle@prod-db.example.com", "bash", "-s"]
        );
        assert_eq!(command.stdin.as_deref(), Some("hostname\n"));
    }

    #[test]
    fn test_key_auth_uses_batch_mode() {
        let (manager, _mock) = SubprocessManager::mock();
        let session = OpenSshSession::new(
            EndpointRole::Target,
            &endpoint(None),
            manager.runner(),
            Some(Duration::from_secs(60)),
        );

        let command = session.build_command("true");
        assert_eq!(command.program, "ssh");
        assert!(command.args.contains(&"BatchMode=yes".to_string()));
        assert!(command.args.contains(&"StrictHostKeyChecking=accept-new".to_string()));
        assert_eq!(command.timeout, Some(Duration::from_secs(60)));
        assert_eq!(session.label(), "QA oracle@prod-db.example.com");
    }

    #[tokio::test]
    async fn test_connect_maps_ssh_failure_to_connection_error() {
        let (manager, mut mock) = SubprocessManager::mock();
        mock.expect_command("ssh")
            .returns_stderr("ssh: connect to host prod-db.example.com port 22: No route to host\n")
            .returns_exit_code(255)
            .finish();

        let connector = OpenSshConnector::new(manager.runner(), None);
        let err = connector
            .connect(EndpointRole::Source, &endpoint(None))
            .await
            .err()
            .unwrap();

        assert_eq!(err.code(), ErrorCode::CONNECTION_UNREACHABLE);
        assert!(err.user_message().contains("No route to host"));
    }

    #[tokio::test]
    async fn test_connect_rejected_password() {
        let (manager, mut mock) = SubprocessManager::mock();
        mock.expect_command("sshpass").returns_exit_code(5).finish();

        let connector = OpenSshConnector::new(manager.runner(), None);
        let err = connector
            .connect(EndpointRole::Source, &endpoint(Some("wrong")))
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), ErrorCode::CONNECTION_REJECTED);
    }

    #[tokio::test]
    async fn test_execute_returns_remote_exit_code() {
        let (manager, mut mock) = SubprocessManager::mock();
        mock.expect_command("ssh")
            .returns_stdout("out\n")
            .returns_stderr("ORA-00942\n")
            .returns_exit_code(1)
            .finish();

        let session =
            OpenSshSession::new(EndpointRole::Source, &endpoint(None), manager.runner(), None);
        let output = session.execute("sqlplus").await.unwrap();
        assert_eq!(output.exit_code, 1);
        assert_eq!(output.stderr, "ORA-00942\n");
        assert!(!output.succeeded());
    }

    #[tokio::test]
    async fn test_dropped_session_is_session_error() {
        let (manager, mut mock) = SubprocessManager::mock();
        mock.expect_command("ssh")
            .returns_stderr("Connection reset by peer\n")
            .returns_exit_code(255)
            .finish();

        let session =
            OpenSshSession::new(EndpointRole::Target, &endpoint(None), manager.runner(), None);
        let err = session.execute("impdp").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::SESSION_DROPPED);
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_command_timeout_is_session_error() {
        let (manager, mut mock) = SubprocessManager::mock();
        mock.expect_command("ssh").times_out().finish();

        let session = OpenSshSession::new(
            EndpointRole::Target,
            &endpoint(None),
            manager.runner(),
            Some(Duration::from_secs(1)),
        );
        let err = session.execute("impdp").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::SESSION_TIMEOUT);

        let stream = session.execute_streaming("impdp").await.unwrap();
        let err = stream.exit.await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::SESSION_TIMEOUT);
    }

    #[tokio::test]
    async fn test_closed_session_refuses_commands() {
        let (manager, mock) = SubprocessManager::mock();
        let session =
            OpenSshSession::new(EndpointRole::Target, &endpoint(None), manager.runner(), None);
        session.close().await.unwrap();

        assert!(session.execute("true").await.is_err());
        assert!(mock.get_call_history().is_empty());
    }

    #[tokio::test]
    async fn test_streaming_yields_lines_and_exit() {
        let (manager, mut mock) = SubprocessManager::mock();
        mock.expect_command("ssh")
            .returns_stdout("a\nb\n")
            .returns_exit_code(3)
            .finish();

        let session =
            OpenSshSession::new(EndpointRole::Source, &endpoint(None), manager.runner(), None);
        let stream = session.execute_streaming("expdp").await.unwrap();
        let lines: Vec<String> = stream.stdout.map(|l| l.unwrap()).collect().await;
        assert_eq!(lines, vec!["a", "b"]);
        assert_eq!(stream.exit.await.unwrap(), 3);
    }
}
