// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the sync runtime.

use std::time::Duration;

use thiserror::Error;

use crate::remote::RemoteError;

/// Errors that abort a sync operation.
///
/// Per-item upload failures never surface here; they are recorded on the
/// queue item instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("network unavailable")]
    NetworkUnavailable,

    #[error("not authenticated with the remote store")]
    Unauthenticated,

    #[error("sync is disabled")]
    Disabled,

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("local store error: {0}")]
    Store(#[from] mk_core::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Short human-readable reason for failure callbacks.
    pub fn reason(&self) -> String {
        match self {
            SyncError::NetworkUnavailable => "No network connection".to_string(),
            SyncError::Unauthenticated => "Please sign in to sync".to_string(),
            SyncError::Disabled => "Sync is turned off".to_string(),
            SyncError::Remote(RemoteError::Unauthenticated) => "Please sign in to sync".to_string(),
            SyncError::Remote(RemoteError::Unavailable(_)) => "Remote store unreachable".to_string(),
            SyncError::Remote(e) => format!("Sync failed: {}", e),
            SyncError::Store(_) => "Local data could not be read".to_string(),
            SyncError::Timeout(_) => "Sync timed out".to_string(),
            SyncError::Cancelled => "Sync cancelled".to_string(),
            SyncError::Config(msg) => format!("Invalid sync settings: {}", msg),
            SyncError::Io(e) => format!("Sync failed: {}", e),
        }
    }

    /// Returns true if retrying later may succeed without user action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::NetworkUnavailable
                | SyncError::Timeout(_)
                | SyncError::Remote(RemoteError::Unavailable(_) | RemoteError::Timeout)
        )
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
