// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Monotonic millisecond clock for record timestamps.
//!
//! Every local write stamps `updated_at` from a [`MonotonicClock`]. The clock
//! never repeats or goes backwards, even when the wall clock steps back, and
//! it can [`observe`](MonotonicClock::observe) timestamps seen on remote
//! documents so a later local edit always sorts after the state it replaced.

use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Trait for getting the current wall clock time.
///
/// This allows injecting a mock clock for testing.
pub trait ClockSource: Send + Sync {
    /// Returns the current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> i64;
}

/// System clock implementation using `std::time::SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

impl<C: ClockSource> ClockSource for &C {
    fn now_ms(&self) -> i64 {
        (*self).now_ms()
    }
}

impl<C: ClockSource + ?Sized> ClockSource for std::sync::Arc<C> {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

/// A clock source whose time is set by hand.
///
/// Lets embedders and tests drive last-write-wins ordering deterministically.
#[derive(Debug, Default)]
pub struct ManualClock {
    time_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(initial_ms: i64) -> Self {
        ManualClock { time_ms: AtomicI64::new(initial_ms) }
    }

    pub fn set(&self, ms: i64) {
        self.time_ms.store(ms, AtomicOrdering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.time_ms.fetch_add(ms, AtomicOrdering::SeqCst);
    }
}

impl ClockSource for ManualClock {
    fn now_ms(&self) -> i64 {
        self.time_ms.load(AtomicOrdering::SeqCst)
    }
}

/// A clock that produces strictly increasing millisecond timestamps.
pub struct MonotonicClock<C: ClockSource = SystemClock> {
    clock: C,
    last_ms: Mutex<i64>,
}

impl MonotonicClock<SystemClock> {
    /// Creates a monotonic clock over the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MonotonicClock<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ClockSource> MonotonicClock<C> {
    /// Creates a monotonic clock with a custom clock source.
    pub fn with_clock(clock: C) -> Self {
        MonotonicClock { clock, last_ms: Mutex::new(0) }
    }

    /// Returns the next timestamp.
    ///
    /// The result is the wall time, or one past the previous result when the
    /// wall clock has not advanced.
    pub fn now(&self) -> i64 {
        let physical = self.clock.now_ms();
        let mut last = self.last_ms.lock().unwrap_or_else(|e| e.into_inner());
        let next = if physical > *last { physical } else { *last + 1 };
        *last = next;
        next
    }

    /// Advances the clock past a timestamp seen elsewhere.
    pub fn observe(&self, seen_ms: i64) {
        let mut last = self.last_ms.lock().unwrap_or_else(|e| e.into_inner());
        if seen_ms > *last {
            *last = seen_ms;
        }
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
