//! CLI Adapter
//!
//! Command-line interface for the rugshield service.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{
    CliApp, Command, DisableCmd, ProtectCmd, RemoveCmd, RunCmd, StatusCmd, ToggleCmd,
};
