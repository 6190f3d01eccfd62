//! Command line front end
//!
//! Thin layer over the library: argument parsing, secret collection and
//! rendering of the run log on the console.

pub mod args;
pub mod commands;
pub mod router;

pub use args::{Cli, Commands, ConfigCommands};
pub use router::execute_command;
