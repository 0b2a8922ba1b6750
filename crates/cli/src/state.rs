// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Layout of the per-user state directory.
//!
//! ```text
//! <state>/ledger.db    local records, upload queue and checkpoints
//! <state>/sync.toml    sync settings (optional)
//! <state>/watch.lock   held by a running `mk watch`
//! ```

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use mk_core::Ledger;
use mk_sync::SyncConfig;

use crate::env;
use crate::error::{Error, Result};

const DB_NAME: &str = "ledger.db";
const CONFIG_NAME: &str = "sync.toml";
const LOCK_NAME: &str = "watch.lock";

/// The state directory of one device.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StateDir { root: root.into() }
    }

    /// Resolve from `-C`, then `MK_STATE_DIR`, then `$XDG_STATE_HOME/mk`,
    /// then `~/.local/state/mk`.
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        if let Some(dir) = explicit.or_else(env::state_dir) {
            return Self::new(dir);
        }
        if let Some(dir) = env::xdg_state_home() {
            return Self::new(dir.join("mk"));
        }
        Self::new(
            dirs::home_dir()
                .map(|h| h.join(".local/state/mk"))
                .unwrap_or_else(|| PathBuf::from(".local/state/mk")),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(DB_NAME)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_NAME)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_NAME)
    }

    /// Open (creating if needed) the local ledger.
    pub fn open_ledger(&self) -> Result<Ledger> {
        Ok(Ledger::open(&self.db_path())?)
    }

    /// Load sync settings; a missing file yields the defaults.
    pub fn load_config(&self) -> Result<SyncConfig> {
        Ok(SyncConfig::load(&self.config_path())?)
    }

    /// Take the single-instance lock for commands that must not overlap a
    /// running watcher. Released when the returned file is dropped.
    pub fn acquire_lock(&self) -> Result<File> {
        fs::create_dir_all(&self.root)?;
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.lock_path())?;
        file.try_lock_exclusive()
            .map_err(|_| Error::AlreadyRunning(self.root.display().to_string()))?;
        Ok(file)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
