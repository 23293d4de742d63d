//! Live playback monitor loop.
//!
//! While the device renders on its own thread, the monitor wakes once per
//! interval and, in this order:
//!
//! 1. reports and resets pending overloads,
//! 2. stops early if tick cancellation is active and the tick limit is exceeded,
//! 3. polls the playback position and graph CPU load and reports them,
//! 4. stops once the position reaches the session length.
//!
//! The order matters near the boundaries: a cancelled run still reports the
//! overloads of its last interval, and never polls the transport afterwards.

use crate::graph::ProcessingGraph;
use crate::overload::OverloadMonitor;
use crate::report::Reporter;
use crate::status::{CheckStatus, Result};
use crate::transport::Transport;
use std::time::Duration;

/// Default pause between monitor ticks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Tick limit used when cancellation is requested without an explicit count.
pub const DEFAULT_CANCEL_TICKS: u32 = 10;

/// Waits between monitor ticks.
pub trait Pacer {
    /// Blocks for `interval`.
    fn wait(&mut self, interval: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep;

impl Pacer for ThreadSleep {
    fn wait(&mut self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

/// Why the monitor loop ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonitorOutcome {
    /// Playback reached the session length.
    ReachedEnd {
        /// Intervals waited.
        ticks: u32,
        /// Position when the loop ended, in beats.
        beats: f64,
    },
    /// The tick limit was exceeded before playback finished.
    Cancelled {
        /// Intervals waited.
        ticks: u32,
    },
}

impl MonitorOutcome {
    /// Intervals waited before the loop ended.
    pub fn ticks(&self) -> u32 {
        match *self {
            Self::ReachedEnd { ticks, .. } | Self::Cancelled { ticks } => ticks,
        }
    }
}

/// Polls a running transport until it finishes or is cancelled.
#[derive(Debug, Clone)]
pub struct LiveMonitor {
    interval: Duration,
    cancel_after: Option<u32>,
}

impl Default for LiveMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveMonitor {
    /// Monitor ticking every [`DEFAULT_INTERVAL`] with no cancellation.
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            cancel_after: None,
        }
    }

    /// Sets the pause between ticks.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stops the loop once more than `ticks` intervals have elapsed,
    /// regardless of playback position.
    pub fn cancel_after(mut self, ticks: Option<u32>) -> Self {
        self.cancel_after = ticks;
        self
    }

    /// Runs the loop, sleeping the current thread between ticks.
    pub fn monitor<T, G>(
        &self,
        transport: &T,
        graph: Option<&G>,
        length: f64,
        overloads: &OverloadMonitor,
        reporter: &mut dyn Reporter,
    ) -> Result<MonitorOutcome>
    where
        T: Transport + ?Sized,
        G: ProcessingGraph,
    {
        self.monitor_with(&mut ThreadSleep, transport, graph, length, overloads, reporter)
    }

    /// Runs the loop with a custom [`Pacer`].
    pub fn monitor_with<P, T, G>(
        &self,
        pacer: &mut P,
        transport: &T,
        graph: Option<&G>,
        length: f64,
        overloads: &OverloadMonitor,
        reporter: &mut dyn Reporter,
    ) -> Result<MonitorOutcome>
    where
        P: Pacer + ?Sized,
        T: Transport + ?Sized,
        G: ProcessingGraph,
    {
        let mut ticks = 0_u32;
        loop {
            pacer.wait(self.interval);
            ticks += 1;

            if let Some(report) = overloads.take() {
                tracing::warn!(
                    count = report.count,
                    since_start = ?report.since_start,
                    "device overloads"
                );
                reporter.overload(&report);
            }

            if let Some(limit) = self.cancel_after
                && ticks > limit
            {
                tracing::info!(ticks, "monitor cancelled after tick limit");
                return Ok(MonitorOutcome::Cancelled { ticks });
            }

            let beats = transport.current_time().check("PlayerGetTime")?;
            let load = match graph {
                Some(graph) => Some(graph.cpu_load().check("GraphGetCPULoad")?),
                None => None,
            };
            reporter.playback_status(beats, load);

            if beats >= length {
                return Ok(MonitorOutcome::ReachedEnd { ticks, beats });
            }
        }
    }
}
