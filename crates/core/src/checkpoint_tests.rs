// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

#[test]
fn checkpoint_created_lazily() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.get_checkpoint("g1", EntityType::Meal).unwrap().is_none());

    let checkpoint = db.ensure_checkpoint("g1", EntityType::Meal).unwrap();
    assert_eq!(checkpoint.scope, "g1");
    assert_eq!(checkpoint.last_sync_timestamp, 0);
    assert!(!checkpoint.is_syncing);
    assert!(db.get_checkpoint("g1", EntityType::Meal).unwrap().is_some());
}

#[test]
fn begin_then_advance() {
    let db = Database::open_in_memory().unwrap();

    db.begin_checkpoint("g1", EntityType::Expense, 3).unwrap();
    let checkpoint = db.get_checkpoint("g1", EntityType::Expense).unwrap().unwrap();
    assert!(checkpoint.is_syncing);
    assert_eq!(checkpoint.pending_operation_count, 3);

    db.advance_checkpoint("g1", EntityType::Expense, 500, 0).unwrap();
    let checkpoint = db.get_checkpoint("g1", EntityType::Expense).unwrap().unwrap();
    assert!(!checkpoint.is_syncing);
    assert_eq!(checkpoint.last_sync_timestamp, 500);
    assert_eq!(checkpoint.pending_operation_count, 0);
}

#[test]
fn watermark_never_moves_backwards() {
    let db = Database::open_in_memory().unwrap();
    db.advance_checkpoint("g1", EntityType::Group, 900, 0).unwrap();
    db.advance_checkpoint("g1", EntityType::Group, 100, 0).unwrap();

    let checkpoint = db.get_checkpoint("g1", EntityType::Group).unwrap().unwrap();
    assert_eq!(checkpoint.last_sync_timestamp, 900);
}

#[test]
fn watermarks_are_kept_per_scope() {
    let db = Database::open_in_memory().unwrap();
    db.advance_checkpoint("g1", EntityType::Expense, 900, 0).unwrap();

    let other = db.ensure_checkpoint("g2", EntityType::Expense).unwrap();
    assert_eq!(other.last_sync_timestamp, 0);

    db.advance_checkpoint("g2", EntityType::Expense, 40, 0).unwrap();
    let first = db.get_checkpoint("g1", EntityType::Expense).unwrap().unwrap();
    assert_eq!(first.last_sync_timestamp, 900);
}

#[test]
fn failure_keeps_watermark_and_records_error() {
    let db = Database::open_in_memory().unwrap();
    db.advance_checkpoint("g1", EntityType::Member, 42, 0).unwrap();
    db.begin_checkpoint("g1", EntityType::Member, 1).unwrap();
    db.fail_checkpoint("g1", EntityType::Member, "No network connection").unwrap();

    let checkpoint = db.get_checkpoint("g1", EntityType::Member).unwrap().unwrap();
    assert_eq!(checkpoint.last_sync_timestamp, 42);
    assert!(!checkpoint.is_syncing);
    assert_eq!(checkpoint.last_error.as_deref(), Some("No network connection"));

    db.advance_checkpoint("g1", EntityType::Member, 50, 0).unwrap();
    let checkpoint = db.get_checkpoint("g1", EntityType::Member).unwrap().unwrap();
    assert!(checkpoint.last_error.is_none());
}

#[test]
fn list_groups_by_scope_in_upload_order() {
    let db = Database::open_in_memory().unwrap();
    db.ensure_checkpoint("g2", EntityType::Group).unwrap();
    db.ensure_checkpoint("g1", EntityType::Expense).unwrap();
    db.ensure_checkpoint("g1", EntityType::Group).unwrap();

    let keys: Vec<_> = db
        .list_checkpoints()
        .unwrap()
        .into_iter()
        .map(|c| (c.scope, c.entity_type))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("g1".to_string(), EntityType::Group),
            ("g1".to_string(), EntityType::Expense),
            ("g2".to_string(), EntityType::Group),
        ]
    );
}

#[test]
fn wipe_clears_checkpoints() {
    let db = Database::open_in_memory().unwrap();
    db.advance_checkpoint("g1", EntityType::Meal, 10, 0).unwrap();
    db.wipe().unwrap();
    assert!(db.list_checkpoints().unwrap().is_empty());
}
