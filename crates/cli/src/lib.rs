// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! mkrs - library behind the `mk` CLI.
//!
//! `mk` is an operator tool over one device's local ledger: it records local
//! changes, inspects the upload queue and checkpoints, requeues parked
//! uploads, and runs the sync runtime against a shared folder.
//!
//! # Main Components
//!
//! - [`Cli`] - argument parsing
//! - [`StateDir`] - where the ledger, settings and lock file live
//! - [`Error`] - error type with user-facing hints

mod cli;
mod commands;
mod env;
pub mod error;
pub mod logging;
pub mod state;

pub use cli::{AddCommand, CategoryArg, Cli, Command, EntityArg, OutputFormat, RemoteArgs};
pub use error::{Error, Result};
pub use state::StateDir;

/// Run a parsed command against `state`.
pub fn run(state: &StateDir, command: Command) -> Result<()> {
    match command {
        Command::Status { output } => commands::status::status(state, output),
        Command::Queue { failed, output } => commands::status::queue(state, failed, output),
        Command::Retry => commands::status::retry(state),
        Command::Add { record } => commands::records::add(state, record),
        Command::List { kind, group, output } => {
            commands::records::list(state, kind, group.as_deref(), output)
        }
        Command::Remove { id } => commands::records::remove(state, &id),
        Command::Sync(args) => commands::sync::sync(state, args),
        Command::Watch(args) => commands::sync::watch(state, args),
        Command::Reset => commands::reset::run(state),
    }
}

/// Default log filter: chatty for the long-running watcher, quiet otherwise.
pub fn default_log_filter(command: &Command) -> &'static str {
    match command {
        Command::Watch(_) => "info",
        _ => "warn",
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
