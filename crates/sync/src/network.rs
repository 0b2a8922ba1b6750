// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Network availability and edge-triggered drain requests.
//!
//! Platform callbacks arrive on arbitrary threads. They only update state
//! and `try_send` a [`DrainRequest`]; the drain itself runs on the drain
//! worker task.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Raw connectivity callbacks from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    Available,
    Lost,
    CapabilitiesChanged { internet: bool, validated: bool },
}

/// Why a drain was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainRequest {
    /// Connectivity came back.
    Reconnected,
    /// Local edits or a manual retry.
    Requested,
}

/// Source of network availability.
pub trait NetworkMonitor: Send + Sync {
    fn is_available(&self) -> bool;

    /// Watch availability. The receiver sees every transition.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Push-driven monitor fed by platform callbacks or tests.
pub struct ManualNetworkMonitor {
    tx: watch::Sender<bool>,
}

impl ManualNetworkMonitor {
    pub fn new(available: bool) -> Self {
        let (tx, _) = watch::channel(available);
        ManualNetworkMonitor { tx }
    }

    pub fn set_available(&self, available: bool) {
        self.tx.send_if_modified(|current| {
            let changed = *current != available;
            *current = available;
            changed
        });
    }

    /// Apply a platform callback.
    ///
    /// Capability updates without a validated internet route leave the
    /// state as it was.
    pub fn handle(&self, event: NetworkEvent) {
        match event {
            NetworkEvent::Available => self.set_available(true),
            NetworkEvent::Lost => self.set_available(false),
            NetworkEvent::CapabilitiesChanged { internet: true, validated: true } => {
                self.set_available(true)
            }
            NetworkEvent::CapabilitiesChanged { .. } => {}
        }
    }
}

impl NetworkMonitor for ManualNetworkMonitor {
    fn is_available(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// A monitor that always reports the network as up.
pub struct AlwaysOnline {
    tx: watch::Sender<bool>,
}

impl AlwaysOnline {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(true);
        AlwaysOnline { tx }
    }
}

impl Default for AlwaysOnline {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMonitor for AlwaysOnline {
    fn is_available(&self) -> bool {
        true
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Turns connectivity events into drain requests on a
/// disconnected-to-connected edge.
pub struct ConnectivityTracker {
    was_connected: AtomicBool,
    drain_tx: mpsc::Sender<DrainRequest>,
}

impl ConnectivityTracker {
    pub fn new(connected: bool, drain_tx: mpsc::Sender<DrainRequest>) -> Self {
        ConnectivityTracker { was_connected: AtomicBool::new(connected), drain_tx }
    }

    pub fn is_connected(&self) -> bool {
        self.was_connected.load(Ordering::Acquire)
    }

    /// Handle one event. Returns true if a drain was requested.
    ///
    /// Never blocks: a full channel already holds a pending request.
    pub fn on_event(&self, event: NetworkEvent) -> bool {
        let regained = match event {
            NetworkEvent::Available
            | NetworkEvent::CapabilitiesChanged { internet: true, validated: true } => {
                !self.was_connected.swap(true, Ordering::AcqRel)
            }
            NetworkEvent::Lost => {
                self.was_connected.store(false, Ordering::Release);
                false
            }
            NetworkEvent::CapabilitiesChanged { .. } => false,
        };
        if !regained {
            return false;
        }
        match self.drain_tx.try_send(DrainRequest::Reconnected) {
            Ok(()) => true,
            Err(e) => {
                debug!("drain request not queued: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
