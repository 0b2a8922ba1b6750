// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for sync runtime tests.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, TimeZone, Utc};

use mk_core::{Database, Expense, ExpenseCategory, Group, Ledger, ManualClock, Meal, QueueItem};

use crate::config::SyncConfig;
use crate::orchestrator::{CycleReport, SyncObserver};
use crate::remote::MemoryRemoteStore;

/// A ledger whose clock starts at `ms` and only moves when told to.
pub fn ledger_at(ms: i64) -> (Ledger, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(ms));
    let ledger = Ledger::with_clock(Database::open_in_memory().unwrap(), clock.clone());
    (ledger, clock)
}

/// A remote store whose own clock never runs ahead of the writers.
pub fn remote() -> MemoryRemoteStore {
    MemoryRemoteStore::with_clock(Arc::new(ManualClock::new(0)))
}

/// Small limits so tests hit them quickly.
pub fn config() -> SyncConfig {
    SyncConfig { max_retries: 3, request_timeout_secs: 1, ..SyncConfig::default() }
}

pub fn group(name: &str) -> Group {
    Group {
        name: name.to_string(),
        grocery_budget_per_meal: 40.0,
        cooking_charge_per_meal: 10.0,
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub fn expense(group_id: &str, amount: f64) -> Expense {
    Expense {
        group_id: group_id.to_string(),
        added_by: "m1".to_string(),
        category: ExpenseCategory::Grocery,
        amount,
        title: "Rice".to_string(),
        description: None,
        expense_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
    }
}

pub fn meal(group_id: &str, member_id: &str, lunch: u32) -> Meal {
    Meal {
        group_id: group_id.to_string(),
        member_id: member_id.to_string(),
        date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        breakfast: 0,
        lunch,
        dinner: 1,
    }
}

/// One observer callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Started,
    Progress(u8, String),
    Completed,
    Failed(String),
    Parked(usize),
}

/// Observer that records every callback.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Progress(percent, _) => Some(percent),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl SyncObserver for RecordingObserver {
    fn on_started(&self) {
        self.push(Event::Started);
    }

    fn on_progress(&self, percent: u8, stage: &str) {
        self.push(Event::Progress(percent, stage.to_string()));
    }

    fn on_completed(&self, _report: &CycleReport) {
        self.push(Event::Completed);
    }

    fn on_failed(&self, reason: &str) {
        self.push(Event::Failed(reason.to_string()));
    }

    fn on_parked(&self, items: &[QueueItem]) {
        self.push(Event::Parked(items.len()));
    }
}
