// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! mk-core: local side of the offline-first sync core for the mk ledger
//!
//! This crate provides the data model, the SQLite local store, the durable
//! mutation queue, per-type sync checkpoints, and the last-write-wins
//! reconciler used by the mk-sync runtime and the mk CLI.

pub mod checkpoint;
pub mod clock;
pub mod db;
pub mod entity;
pub mod error;
pub mod jsonl;
pub mod ledger;
pub mod model;
pub mod queue;
pub mod reconcile;
pub mod record;

pub use checkpoint::SyncCheckpoint;
pub use clock::{ClockSource, ManualClock, MonotonicClock, SystemClock};
pub use db::Database;
pub use entity::{Entity, EntityType, Operation, SyncStatus};
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use model::{Expense, ExpenseCategory, Group, Meal, Member, Role};
pub use queue::{EnqueueOutcome, Intent, QueueItem, QueueStatus};
pub use reconcile::{Reconcile, ReconcileOutcome, ReconcileReport};
pub use record::{new_local_id, RemoteDocument, SyncableRecord};
