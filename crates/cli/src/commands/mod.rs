// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod records;
pub mod reset;
pub mod status;
pub mod sync;

use chrono::{DateTime, Utc};

use mk_core::{EntityType, QueueItem};
use mk_sync::{CycleReport, SyncObserver};

use crate::cli::EntityArg;

impl From<EntityArg> for EntityType {
    fn from(kind: EntityArg) -> Self {
        match kind {
            EntityArg::Group => EntityType::Group,
            EntityArg::Member => EntityType::Member,
            EntityArg::Meal => EntityType::Meal,
            EntityArg::Expense => EntityType::Expense,
        }
    }
}

/// Format a millisecond timestamp for display.
pub fn format_ms(ms: i64) -> String {
    if ms == 0 {
        return "never".to_string();
    }
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => ms.to_string(),
    }
}

/// Prints cycle progress to stderr.
///
/// One-shot commands return failures as errors, so only long-running ones
/// print them here.
pub struct ProgressPrinter {
    print_failures: bool,
}

impl ProgressPrinter {
    pub fn one_shot() -> Self {
        ProgressPrinter { print_failures: false }
    }

    pub fn long_running() -> Self {
        ProgressPrinter { print_failures: true }
    }
}

impl SyncObserver for ProgressPrinter {
    fn on_progress(&self, percent: u8, stage: &str) {
        eprintln!("[{:>3}%] {}", percent, stage);
    }

    fn on_completed(&self, report: &CycleReport) {
        tracing::info!(
            uploaded = report.uploaded.succeeded,
            downloaded = report.downloaded.inserted + report.downloaded.updated,
            "cycle completed"
        );
    }

    fn on_failed(&self, reason: &str) {
        if self.print_failures {
            eprintln!("sync failed: {}", reason);
        }
    }

    fn on_parked(&self, items: &[QueueItem]) {
        eprintln!(
            "warning: {} upload(s) gave up after repeated failures\n  hint: run 'mk queue --failed', then 'mk retry'",
            items.len()
        );
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
