//! CLI argument structures

use crate::refresh::RefreshMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Refresh a QA pluggable database from production with Data Pump
#[derive(Parser)]
#[command(name = "pdb-refresh")]
#[command(about = "pdb-refresh - Refresh a QA database from production with Data Pump over SSH", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug and remote output, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export from PROD, copy the dump and import into QA
    #[command(name = "refresh")]
    Refresh {
        /// Refresh the whole database or a list of schemas
        #[arg(short, long, value_name = "full|schema")]
        mode: RefreshMode,

        /// Comma separated schema names (schema mode only)
        #[arg(short, long, value_name = "A,B", value_delimiter = ',')]
        schemas: Vec<String>,

        /// Configuration file (defaults to ./pdb-refresh.toml or the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Connect to both hosts and show the resolved database environment
    #[command(name = "check")]
    Check {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Manage the configuration file
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration template
    Init {
        /// Where to write it (defaults to the user config dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the non-secret configuration
    Show {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_schema_refresh() {
        let cli = Cli::try_parse_from([
            "pdb-refresh",
            "-vv",
            "refresh",
            "--mode",
            "schema",
            "--schemas",
            "hr,sales",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Refresh {
                mode,
                schemas,
                config,
            } => {
                assert_eq!(mode, RefreshMode::Schema);
                assert_eq!(schemas, vec!["hr", "sales"]);
                assert!(config.is_none());
            }
            _ => panic!("expected refresh"),
        }
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["pdb-refresh", "refresh", "--mode", "partial"]).is_err());
    }
}
