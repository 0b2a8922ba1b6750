// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for mk-core operations.

use thiserror::Error;

/// All possible errors that can occur in mk-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("queue item not found: {0}")]
    QueueItemNotFound(i64),

    #[error("invalid entity type: '{0}'\n  hint: valid types are: group, member, meal, expense")]
    InvalidEntityType(String),

    #[error("invalid sync status: '{0}'\n  hint: valid statuses are: synced, pending, delete, conflict")]
    InvalidSyncStatus(String),

    #[error("invalid operation: '{0}'\n  hint: valid operations are: create, update, delete")]
    InvalidOperation(String),

    #[error("invalid queue status: '{0}'")]
    InvalidQueueStatus(String),

    #[error("entity type mismatch: expected {expected}, got {actual}")]
    EntityTypeMismatch { expected: String, actual: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

impl Error {
    /// Returns true if this error means a stored record could not be read back.
    ///
    /// Such records are skipped by the reconciler instead of aborting a batch.
    pub fn is_corruption(&self) -> bool {
        match self {
            Error::CorruptedData(_) | Error::Json(_) => true,
            Error::Database(rusqlite::Error::FromSqlConversionFailure(..)) => true,
            _ => false,
        }
    }
}

/// A specialized Result type for mk-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
