//! # podgrid-cli
//!
//! Thin command-line adapter over the podgrid core: argument parsing,
//! output rendering, and dispatch to the discovery, lifecycle and
//! registry operations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format};
pub use error::CliError;
pub use output::OutputFormat;
