// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use crate::error::Result;
use crate::state::StateDir;

/// Sign out: wipe records, queued uploads and checkpoints.
///
/// Refuses while a watcher holds the state directory.
pub fn run(state: &StateDir) -> Result<()> {
    let _lock = state.acquire_lock()?;
    let ledger = state.open_ledger()?;
    let discarded = ledger.with_db(|db| db.pending_count())?;
    ledger.wipe()?;
    tracing::info!(discarded, "local state wiped");
    if discarded > 0 {
        println!("Local state wiped ({} unsynced change(s) discarded)", discarded);
    } else {
        println!("Local state wiped");
    }
    Ok(())
}
