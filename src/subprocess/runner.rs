use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

use super::error::ProcessError;

/// A local program invocation, normally the ssh client
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment for the child. Values may hold credentials and are
    /// never logged.
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
    pub stdin: Option<String>,
}

impl ProcessCommand {
    /// Program and arguments, for log lines and error messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Timeout,
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            ExitStatus::Timeout | ExitStatus::Signal(_) => None,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ExitStatus::Success,
            code => ExitStatus::Error(code),
        }
    }

    fn from_std(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::from_code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitStatus::Signal(signal);
            }
        }
        ExitStatus::Error(1)
    }
}

pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, ProcessError>> + Send>>;
pub type StatusFuture =
    Pin<Box<dyn futures::Future<Output = Result<ExitStatus, ProcessError>> + Send>>;

/// Output of a running process, line by line, plus its eventual status
pub struct ProcessStream {
    pub stdout: LineStream,
    pub stderr: LineStream,
    pub status: StatusFuture,
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
    async fn run_streaming(&self, command: ProcessCommand) -> Result<ProcessStream, ProcessError>;
}

/// Variables the ssh client needs from the parent; everything else is cleared
const INHERITED_ENV: [&str; 7] = [
    "HOME",
    "USER",
    "LOGNAME",
    "SSH_AUTH_SOCK",
    "TMPDIR",
    "LANG",
    "LC_ALL",
];

/// Runs programs with `tokio::process`
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    async fn spawn(command: &ProcessCommand) -> Result<Child, ProcessError> {
        tracing::debug!("Executing subprocess: {}", command.display());
        if !command.env.is_empty() {
            let mut keys: Vec<&str> = command.env.keys().map(String::as_str).collect();
            keys.sort_unstable();
            tracing::trace!("Extra environment variables: {}", keys.join(", "));
        }

        let path = std::env::var("PATH").map_err(|_| ProcessError::InternalError {
            message: format!("PATH is not set; cannot locate '{}'", command.program),
        })?;

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .env_clear()
            .env("PATH", path)
            .envs(INHERITED_ENV.iter().filter_map(|var| {
                std::env::var(var).ok().map(|value| (*var, value))
            }))
            .envs(&command.env)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProcessError::CommandNotFound(command.program.clone()),
            _ => ProcessError::SpawnFailed {
                command: command.display(),
                source: e,
            },
        })?;

        if let (Some(script), Some(mut stdin)) = (&command.stdin, child.stdin.take()) {
            tracing::trace!("Writing {} bytes to stdin", script.len());
            stdin.write_all(script.as_bytes()).await?;
            stdin.shutdown().await?;
        }
        Ok(child)
    }

    fn lines<R>(reader: Option<R>, name: &str, command: String) -> Result<LineStream, ProcessError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let reader = reader.ok_or_else(|| ProcessError::InternalError {
            message: format!("Failed to capture {}", name),
        })?;

        Ok(Box::pin(futures::stream::unfold(
            Some((BufReader::new(reader), command)),
            |state| async move {
                let (mut reader, command) = state?;
                let mut buf = Vec::new();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => None,
                    Ok(_) => {
                        // remote tools echo names in the database character set
                        let line = String::from_utf8_lossy(&buf);
                        let trimmed = line.trim_end_matches(['\n', '\r']).to_string();
                        Some((Ok(trimmed), Some((reader, command))))
                    }
                    Err(source) => Some((Err(ProcessError::IoError { command, source }), None)),
                }
            },
        )))
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let started = Instant::now();
        let child = Self::spawn(&command).await?;

        let output = match command.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| ProcessError::Timeout(limit))??,
            None => child.wait_with_output().await?,
        };

        let result = ProcessOutput {
            status: ExitStatus::from_std(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: started.elapsed(),
        };
        tracing::debug!(
            "{} finished with {:?} in {:?}",
            command.program,
            result.status,
            result.duration
        );
        Ok(result)
    }

    async fn run_streaming(&self, command: ProcessCommand) -> Result<ProcessStream, ProcessError> {
        let mut child = Self::spawn(&command).await?;
        let stdout = Self::lines(child.stdout.take(), "stdout", command.display())?;
        let stderr = Self::lines(child.stderr.take(), "stderr", command.display())?;

        let program = command.program;

        let Some(limit) = command.timeout else {
            let status = Box::pin(async move {
                child
                    .wait()
                    .await
                    .map(ExitStatus::from_std)
                    .map_err(|source| ProcessError::IoError {
                        command: program,
                        source,
                    })
            });
            return Ok(ProcessStream {
                stdout,
                stderr,
                status,
            });
        };

        // The deadline counts from spawn, not from the first poll of the status
        let deadline = tokio::time::Instant::now() + limit;
        let watchdog = tokio::spawn(async move {
            match tokio::time::timeout_at(deadline, child.wait()).await {
                Ok(waited) => waited
                    .map(ExitStatus::from_std)
                    .map_err(|source| ProcessError::IoError {
                        command: program,
                        source,
                    }),
                Err(_) => {
                    tracing::warn!("{} timed out after {:?}", program, limit);
                    if let Err(e) = child.kill().await {
                        tracing::debug!("Failed to kill {}: {}", program, e);
                    }
                    Ok(ExitStatus::Timeout)
                }
            }
        });

        Ok(ProcessStream {
            stdout: Box::pin(stdout.take_until(tokio::time::sleep_until(deadline))),
            stderr: Box::pin(stderr.take_until(tokio::time::sleep_until(deadline))),
            status: Box::pin(async move {
                watchdog.await.map_err(|e| ProcessError::InternalError {
                    message: format!("status task failed: {}", e),
                })?
            }),
        })
    }
}
