use std::collections::HashMap;
use std::time::Duration;

use crate::subprocess::ProcessCommand;

/// Fluent construction of a [`ProcessCommand`]
#[derive(Debug, Clone)]
pub struct ProcessCommandBuilder {
    program: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    timeout: Option<Duration>,
    stdin: Option<String>,
}

impl ProcessCommandBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            timeout: None,
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_string()));
        self
    }

    /// `-o KEY=VALUE` for the ssh family of clients
    pub fn ssh_option(self, key: &str, value: impl std::fmt::Display) -> Self {
        self.arg("-o").arg(format!("{}={}", key, value))
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        self.maybe_timeout(Some(timeout))
    }

    pub fn maybe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Script text for the child's stdin, newline terminated
    pub fn stdin_script(mut self, script: &str) -> Self {
        let mut input = script.to_string();
        if !input.ends_with('\n') {
            input.push('\n');
        }
        self.stdin = Some(input);
        self
    }

    pub fn build(self) -> ProcessCommand {
        ProcessCommand {
            program: self.program,
            args: self.args,
            env: self.env,
            timeout: self.timeout,
            stdin: self.stdin,
        }
    }
}
