//! Slicer CLI Library
//!
//! Command-line front end for the silence slicer: configuration layering,
//! argument parsing, and the `slice` / `levels` commands.
//!
//! This library exposes the core components for testing purposes.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

// Re-export commonly used types for convenience
pub use cli::{Cli, Commands, Overrides};
pub use config::{AppConfig, SampleFormat};
pub use error::{exit_code, CliError, Result};
