//! # pdb-refresh
//!
//! Refresh a QA pluggable database from production with Oracle Data Pump,
//! driving `expdp`, `scp` and `impdp` on both hosts over SSH.
//!
//! ## Usage
//!
//! ```bash
//! pdb-refresh refresh --mode schema --schemas HR,SALES
//! ```
//!
//! ## Modules
//!
//! - `app` - Verbosity, tracing setup and fatal error reporting
//! - `cli` - Argument parsing and subcommands
//! - `config` - Endpoint configuration, persistence and per-run secrets
//! - `error` - Unified error type with numeric codes
//! - `refresh` - Request, remote scripts, outcome classification and the orchestrator
//! - `remote` - Remote shell sessions over OpenSSH plus an in-memory fake
//! - `subprocess` - Local process execution used by the ssh session
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod refresh;
pub mod remote;
pub mod subprocess;
