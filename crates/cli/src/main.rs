// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::Parser;
use mkrs::{Cli, StateDir};

fn main() {
    let cli = Cli::parse();
    mkrs::logging::setup_logging(cli.log_file.as_deref(), mkrs::default_log_filter(&cli.command));

    let state = StateDir::resolve(cli.state_dir);
    if let Err(e) = mkrs::run(&state, cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
