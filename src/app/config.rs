//! Application configuration derived from the command line

/// Process-wide settings chosen on the command line
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub verbose: u8,
}

impl AppConfig {
    pub fn new(verbose: u8) -> Self {
        Self { verbose }
    }

    /// Tracing filter for the configured verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            2 => "trace",
            _ => "trace,tokio=debug", // -vvv shows everything including dependencies
        }
    }

    /// Remote command output is echoed to the console from `-v` up
    pub fn show_remote_output(&self) -> bool {
        self.verbose >= 1
    }
}
