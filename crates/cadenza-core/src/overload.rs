//! Overload notification shared between the audio thread and the monitor loop.
//!
//! The audio runtime reports missed render deadlines on a thread this crate
//! does not control. [`OverloadMonitor`] is the single-producer/single-consumer
//! signal between that thread and the live monitor: the producer calls
//! [`notify`](OverloadMonitor::notify), which is two atomic stores and never
//! blocks; the consumer calls [`take`](OverloadMonitor::take), which swaps the
//! counter back to zero so no increment can be lost between read and reset.
//!
//! One monitor is created per session and shared by `Arc` with both the
//! listener registration and the monitor loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Overloads observed since the previous report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverloadReport {
    /// Number of overload notifications since the last report.
    pub count: u64,
    /// Time from session start to the most recent overload.
    pub since_start: Duration,
}

/// Atomic overload counter plus last-event timestamp.
#[derive(Debug)]
pub struct OverloadMonitor {
    epoch: Instant,
    count: AtomicU64,
    /// Nanoseconds since `epoch` of the most recent overload.
    last_event: AtomicU64,
    /// Nanoseconds since `epoch` at which playback started.
    started_at: AtomicU64,
}

impl Default for OverloadMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl OverloadMonitor {
    /// Creates a monitor whose clock starts now.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            count: AtomicU64::new(0),
            last_event: AtomicU64::new(0),
            started_at: AtomicU64::new(0),
        }
    }

    fn now_nanos(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Records the moment playback started; overload times are reported
    /// relative to it.
    pub fn mark_started(&self) {
        self.started_at.store(self.now_nanos(), Ordering::Release);
    }

    /// Records one overload. Safe to call from a real-time thread.
    pub fn notify(&self) {
        self.last_event.store(self.now_nanos(), Ordering::Release);
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of overloads not yet taken.
    pub fn pending(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Takes the pending overloads, resetting the counter to zero.
    ///
    /// Returns `None` when nothing happened since the last call.
    pub fn take(&self) -> Option<OverloadReport> {
        let count = self.count.swap(0, Ordering::AcqRel);
        if count == 0 {
            return None;
        }
        let last = self.last_event.load(Ordering::Acquire);
        let start = self.started_at.load(Ordering::Acquire);
        Some(OverloadReport {
            count,
            since_start: Duration::from_nanos(last.saturating_sub(start)),
        })
    }
}
