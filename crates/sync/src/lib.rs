// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! mk-sync: async runtime that moves the mk ledger between devices
//!
//! This crate drains the local mutation queue to a remote document store,
//! pulls remote changes back through the last-write-wins reconciler, and
//! ties both to network availability, a periodic schedule and realtime
//! subscriptions.

pub mod config;
pub mod error;
pub mod listener;
pub mod network;
pub mod orchestrator;
pub mod pump;
pub mod remote;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod test_helpers;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use listener::RealtimeListener;
pub use network::{
    AlwaysOnline, ConnectivityTracker, DrainRequest, ManualNetworkMonitor, NetworkEvent,
    NetworkMonitor,
};
pub use orchestrator::{
    CollectionChanged, CycleOutcome, CycleReport, NoopObserver, SyncObserver, SyncOrchestrator,
    SyncScope, SyncState,
};
pub use pump::{DrainReport, UploadPump};
pub use remote::{
    DirRemoteStore, DocumentFilter, MemoryRemoteStore, RemoteError, RemoteResult, RemoteStore,
    UpsertAck, UpsertRequest,
};
pub use scheduler::{PeriodicSync, Schedule};
pub use service::SyncService;
