//! Peak limiter with instant attack and exponential release.
//!
//! Gain follows the block peak down immediately and recovers toward unity
//! with a one-pole release, so output never exceeds the ceiling:
//!
//! ```text
//! target = min(1, ceiling / |x|)
//! g[n]   = target                                   if target < g[n-1]
//! g[n]   = r * g[n-1] + (1 - r) * target            otherwise
//! ```
//!
//! Both channels share one gain so the stereo image does not shift.

use super::Node;
use cadenza_core::{AudioBufferList, ComponentDescriptor, Status};

/// Default output ceiling, about -0.5 dBFS.
pub const DEFAULT_CEILING: f32 = 0.944;

/// Default release time in milliseconds.
pub const DEFAULT_RELEASE_MS: f32 = 100.0;

fn release_coeff(release_ms: f32, sample_rate: f64) -> f32 {
    let samples = f64::from(release_ms) * 0.001 * sample_rate;
    if samples <= 0.0 {
        0.0
    } else {
        (-1.0 / samples).exp() as f32
    }
}

/// Stereo-linked peak limiter.
#[derive(Debug, Clone)]
pub struct PeakLimiter {
    sample_rate: f64,
    ceiling: f32,
    release_ms: f32,
    release_coeff: f32,
    gain: f32,
}

impl PeakLimiter {
    /// Creates a limiter at `sample_rate` with the default ceiling and release.
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ceiling: DEFAULT_CEILING,
            release_ms: DEFAULT_RELEASE_MS,
            release_coeff: release_coeff(DEFAULT_RELEASE_MS, sample_rate),
            gain: 1.0,
        }
    }

    /// Output ceiling as a linear amplitude.
    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Current gain reduction factor, 1.0 when idle.
    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl Node for PeakLimiter {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::PEAK_LIMITER
    }

    fn set_sample_rate(&mut self, sample_rate: f64) -> Result<(), Status> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(Status::INVALID_PROPERTY_VALUE);
        }
        self.sample_rate = sample_rate;
        self.release_coeff = release_coeff(self.release_ms, sample_rate);
        Ok(())
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn reset(&mut self) {
        self.gain = 1.0;
    }

    fn process(
        &mut self,
        input: Option<&AudioBufferList>,
        output: &mut AudioBufferList,
    ) -> Result<(), Status> {
        let Some(input) = input else {
            return Ok(());
        };
        output.copy_from(input);

        let frames = output.frames();
        let channels = output.channel_count();
        for i in 0..frames {
            let peak = (0..channels)
                .map(|c| output.channel(c)[i].abs())
                .fold(0.0_f32, f32::max);
            let target = if peak > self.ceiling {
                self.ceiling / peak
            } else {
                1.0
            };
            self.gain = if target < self.gain {
                target
            } else {
                self.gain + (1.0 - self.release_coeff) * (target - self.gain)
            };
            for c in 0..channels {
                output.channel_mut(c)[i] *= self.gain;
            }
        }
        Ok(())
    }
}
