// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use clap::Parser;
use mk_core::{EntityType, SyncStatus};
use tempfile::TempDir;

fn parse(args: &[&str]) -> Command {
    Cli::try_parse_from(args).unwrap().command
}

#[test]
fn watch_logs_more_than_one_shot_commands() {
    assert_eq!(default_log_filter(&parse(&["mk", "watch", "-r", "/tmp/x", "-g", "g1"])), "info");
    assert_eq!(default_log_filter(&parse(&["mk", "status"])), "warn");
}

#[test]
fn add_then_remove_unsynced_record_leaves_nothing_queued() {
    let temp = TempDir::new().unwrap();
    let state = StateDir::new(temp.path());

    run(&state, parse(&["mk", "add", "expense", "-g", "g1", "--amount", "12", "-t", "Oil"])).unwrap();
    let ledger = state.open_ledger().unwrap();
    let records = ledger.list(EntityType::Expense, None).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].sync_status, SyncStatus::PendingUpload);
    drop(ledger);

    run(&state, Command::Remove { id: records[0].local_id.clone() }).unwrap();

    let ledger = state.open_ledger().unwrap();
    assert!(ledger.list(EntityType::Expense, None).unwrap().is_empty());
    assert_eq!(ledger.with_db(|db| db.pending_count()).unwrap(), 0);
}

#[test]
fn invalid_expense_is_rejected_before_touching_the_ledger() {
    let temp = TempDir::new().unwrap();
    let state = StateDir::new(temp.path());

    let err = run(&state, parse(&["mk", "add", "expense", "-g", "g1", "--amount", "0", "-t", "Oil"]))
        .unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    let ledger = state.open_ledger().unwrap();
    assert!(ledger.list(EntityType::Expense, None).unwrap().is_empty());
}

#[test]
fn removing_unknown_record_fails_with_hint() {
    let temp = TempDir::new().unwrap();
    let state = StateDir::new(temp.path());

    let err = run(&state, Command::Remove { id: "nope".to_string() }).unwrap_err();

    assert!(matches!(err, Error::RecordNotFound(_)));
}

#[test]
fn sync_refuses_while_watch_holds_the_lock() {
    let temp = TempDir::new().unwrap();
    let state = StateDir::new(temp.path());
    let _held = state.acquire_lock().unwrap();

    let err = run(&state, parse(&["mk", "sync", "-r", "/tmp/none", "-g", "g1"])).unwrap_err();

    assert!(matches!(err, Error::AlreadyRunning(_)));
}
