// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Record kinds accepted on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EntityArg {
    Group,
    Member,
    Meal,
    Expense,
}

/// Expense categories accepted on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    #[default]
    Grocery,
    Utility,
    Cooking,
    Other,
}

const QUICKSTART_HELP: &str = "\
Get started:
  mk add group \"Flat 4B\"                       Create a group, prints its id
  mk add expense --group <id> --amount 500 --title Rice
  mk sync --remote ~/Shared/mk --group <id>    Run one sync cycle
  mk status                                    Show pending and parked uploads";

#[derive(Parser)]
#[command(name = "mk")]
#[command(version)]
#[command(about = "Offline-first sync for a shared meal and expense ledger")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// State directory holding the ledger and sync settings
    #[arg(short = 'C', long = "state-dir", global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show pending uploads, parked intents and checkpoints
    Status {
        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// List queued upload intents
    Queue {
        /// Only show intents parked after exhausting their retries
        #[arg(long)]
        failed: bool,

        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Requeue parked intents for the next drain
    Retry,

    /// Record a local change and queue it for upload
    Add {
        #[command(subcommand)]
        record: AddCommand,
    },

    /// List local records of one kind
    List {
        #[arg(value_enum)]
        kind: EntityArg,

        /// Only records of this group
        #[arg(long, short)]
        group: Option<String>,

        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Delete a local record and queue the remote delete
    Remove {
        /// Local id of the record
        id: String,
    },

    /// Run one full sync cycle against a shared folder
    Sync(RemoteArgs),

    /// Keep syncing in the foreground until interrupted
    Watch(RemoteArgs),

    /// Sign out: wipe local records, queue and checkpoints
    Reset,
}

/// Where and what to sync.
#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// Shared folder acting as the remote store
    #[arg(long, short, value_name = "DIR")]
    pub remote: PathBuf,

    /// Group to sync
    #[arg(long, short)]
    pub group: String,
}

#[derive(Subcommand)]
pub enum AddCommand {
    /// A new group; its id scopes every other record
    Group {
        name: String,

        #[arg(long, default_value_t = 0.0)]
        grocery_budget: f64,

        #[arg(long, default_value_t = 0.0)]
        cooking_charge: f64,
    },

    /// A person in a group
    Member {
        #[arg(long, short)]
        group: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        admin: bool,
    },

    /// Meal counts for a member on one day
    Meal {
        #[arg(long, short)]
        group: String,

        #[arg(long, short)]
        member: String,

        /// Day of the meal (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long, default_value_t = 0)]
        breakfast: u32,

        #[arg(long, default_value_t = 0)]
        lunch: u32,

        #[arg(long, default_value_t = 0)]
        dinner: u32,
    },

    /// Money spent on behalf of the group
    Expense {
        #[arg(long, short)]
        group: String,

        #[arg(long)]
        amount: f64,

        #[arg(long, short)]
        title: String,

        /// Member who paid
        #[arg(long, default_value = "me")]
        by: String,

        #[arg(long, short, value_enum, default_value_t)]
        category: CategoryArg,

        #[arg(long, short)]
        description: Option<String>,

        /// Day of the expense (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
