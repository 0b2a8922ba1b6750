// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Entity kinds and sync state enums shared by the local and remote stores.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Collection a replicated record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// The shared household ledger itself.
    Group,
    /// A person belonging to a group.
    Member,
    /// One member's meal counts for one day.
    Meal,
    /// A shared expense paid by a member.
    Expense,
}

impl EntityType {
    /// Parent-before-child order used when uploading.
    ///
    /// Members reference their group and meals/expenses reference members,
    /// so uploading in this order never leaves a dangling reference remotely.
    pub const UPLOAD_ORDER: [EntityType; 4] =
        [EntityType::Group, EntityType::Member, EntityType::Meal, EntityType::Expense];

    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Group => "group",
            EntityType::Member => "member",
            EntityType::Meal => "meal",
            EntityType::Expense => "expense",
        }
    }

    /// Name of the remote collection holding this type.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityType::Group => "groups",
            EntityType::Member => "members",
            EntityType::Meal => "meals",
            EntityType::Expense => "expenses",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "group" => Ok(EntityType::Group),
            "member" => Ok(EntityType::Member),
            "meal" => Ok(EntityType::Meal),
            "expense" => Ok(EntityType::Expense),
            _ => Err(Error::InvalidEntityType(s.to_string())),
        }
    }
}

/// Replication state of a local record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Matches the last state accepted by the remote store.
    #[serde(rename = "synced")]
    Synced,
    /// Has a local edit not yet confirmed remotely.
    #[serde(rename = "pending")]
    PendingUpload,
    /// Deleted locally; the remote delete is not yet confirmed.
    #[serde(rename = "delete")]
    PendingDelete,
    /// Its queued intent exhausted the retry ceiling and needs attention.
    #[serde(rename = "conflict")]
    Conflict,
}

impl SyncStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::PendingUpload => "pending",
            SyncStatus::PendingDelete => "delete",
            SyncStatus::Conflict => "conflict",
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, SyncStatus::Synced)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "synced" => Ok(SyncStatus::Synced),
            "pending" => Ok(SyncStatus::PendingUpload),
            "delete" => Ok(SyncStatus::PendingDelete),
            "conflict" => Ok(SyncStatus::Conflict),
            _ => Err(Error::InvalidSyncStatus(s.to_string())),
        }
    }
}

/// Kind of outbound change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            _ => Err(Error::InvalidOperation(s.to_string())),
        }
    }
}

/// A business type that can be replicated.
///
/// Implementors are plain serde structs; [`SyncableRecord`](crate::SyncableRecord)
/// carries the sync metadata around them.
pub trait Entity: Serialize + DeserializeOwned {
    /// Collection this type is stored in.
    const ENTITY_TYPE: EntityType;

    /// Group that owns the entity.
    ///
    /// `None` for the group itself, whose own id is its group id.
    fn group_id(&self) -> Option<&str>;

    /// Application-level key shared by both stores, if the type has one.
    ///
    /// Lets a remote document be matched to a local record that was created
    /// independently on another device.
    fn natural_key(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
