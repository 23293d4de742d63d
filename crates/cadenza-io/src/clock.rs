//! Playback position shared between the transport and the render thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Default)]
struct ClockState {
    running: AtomicBool,
    /// Position of the last locate or rate change, as `f64` bits.
    base_seconds: AtomicU64,
    /// Frames rendered since `base_seconds`.
    frames: AtomicU64,
    /// Rate `frames` were rendered at, as `f64` bits; zero before the first block.
    sample_rate: AtomicU64,
}

/// Sequence clock in seconds.
///
/// The transport sets the position and running flag; the active output node
/// advances the position after every block it renders while running. Clones
/// share state.
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    state: Arc<ClockState>,
}

impl PlaybackClock {
    /// A stopped clock at position zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position in seconds.
    pub fn seconds(&self) -> f64 {
        let base = f64::from_bits(self.state.base_seconds.load(Ordering::Acquire));
        let rate = f64::from_bits(self.state.sample_rate.load(Ordering::Acquire));
        if rate > 0.0 {
            base + self.state.frames.load(Ordering::Acquire) as f64 / rate
        } else {
            base
        }
    }

    /// Moves the clock to `seconds`.
    pub fn set_seconds(&self, seconds: f64) {
        self.state
            .base_seconds
            .store(seconds.to_bits(), Ordering::Release);
        self.state.frames.store(0, Ordering::Release);
    }

    /// Returns `true` while the transport is started.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Starts or stops the clock.
    pub fn set_running(&self, running: bool) {
        self.state.running.store(running, Ordering::Release);
    }

    /// Advances by `frames` at `sample_rate` if running. Called from the
    /// render thread only.
    ///
    /// Rendered frames are counted exactly; seconds are derived on read, so
    /// the position after `n` blocks never drifts from `n * frames / rate`.
    pub fn advance(&self, frames: u32, sample_rate: f64) {
        if !self.is_running() || sample_rate <= 0.0 {
            return;
        }
        let rate = f64::from_bits(self.state.sample_rate.load(Ordering::Acquire));
        if rate != sample_rate {
            self.set_seconds(self.seconds());
            self.state
                .sample_rate
                .store(sample_rate.to_bits(), Ordering::Release);
        }
        self.state
            .frames
            .fetch_add(u64::from(frames), Ordering::AcqRel);
    }
}
