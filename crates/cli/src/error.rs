// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// All errors surfaced by the `mk` CLI.
///
/// Messages carry a hint where the fix is obvious.
#[derive(Debug, Error)]
pub enum Error {
    #[error("record not found: {0}\n  hint: run 'mk list <kind>' to see local ids")]
    RecordNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("another 'mk watch' is running on {0}\n  hint: stop it first")]
    AlreadyRunning(String),

    #[error("{0}")]
    Sync(String),

    #[error(transparent)]
    Core(mk_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<mk_core::Error> for Error {
    fn from(e: mk_core::Error) -> Self {
        match e {
            mk_core::Error::RecordNotFound(id) => Error::RecordNotFound(id),
            other => Error::Core(other),
        }
    }
}

impl From<mk_sync::SyncError> for Error {
    fn from(e: mk_sync::SyncError) -> Self {
        match e {
            mk_sync::SyncError::Store(inner) => inner.into(),
            other => {
                tracing::debug!(error = %other, "sync failed");
                Error::Sync(other.reason())
            }
        }
    }
}

/// A specialized Result type for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
