//! Render buffers and timestamps.

/// Non-interleaved audio block: one `Vec<f32>` per channel.
///
/// Storage is allocated once at the block capacity; [`prepare`](Self::prepare)
/// resets the valid length and zeroes the samples so the same list can be
/// reused for every block of a render loop.
#[derive(Debug, Clone, Default)]
pub struct AudioBufferList {
    channels: Vec<Vec<f32>>,
    frames: usize,
}

impl AudioBufferList {
    /// Allocates `channel_count` channels of `capacity` frames each.
    pub fn new(channel_count: usize, capacity: usize) -> Self {
        Self {
            channels: vec![vec![0.0; capacity]; channel_count],
            frames: capacity,
        }
    }

    /// Stereo buffer list with the given capacity.
    pub fn stereo(capacity: usize) -> Self {
        Self::new(2, capacity)
    }

    /// Sets the valid length to `frames` and zeroes it, growing if needed.
    pub fn prepare(&mut self, frames: usize) {
        for channel in &mut self.channels {
            if channel.len() < frames {
                channel.resize(frames, 0.0);
            }
            channel[..frames].fill(0.0);
        }
        self.frames = frames;
    }

    /// Number of valid frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Valid samples of one channel.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index][..self.frames]
    }

    /// Mutable valid samples of one channel.
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        let frames = self.frames;
        &mut self.channels[index][..frames]
    }

    /// Iterates over the valid samples of every channel.
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(|c| &c[..self.frames])
    }

    /// Copies `other`'s valid frames into this list, channel by channel.
    ///
    /// Missing source channels are filled from the last source channel.
    pub fn copy_from(&mut self, other: &AudioBufferList) {
        self.prepare(other.frames);
        let last = other.channel_count().saturating_sub(1);
        for (i, channel) in self.channels.iter_mut().enumerate() {
            if other.channel_count() == 0 {
                break;
            }
            channel[..other.frames].copy_from_slice(other.channel(i.min(last)));
        }
    }

    /// Writes the valid frames interleaved into `out`.
    ///
    /// `out_channels` may differ from the list's channel count: extra output
    /// channels are silenced, a mono output receives the channel average.
    pub fn interleave_into(&self, out: &mut [f32], out_channels: usize) {
        if out_channels == 0 {
            return;
        }
        let frames = self.frames.min(out.len() / out_channels);
        let count = self.channel_count();
        for i in 0..frames {
            let frame = &mut out[i * out_channels..(i + 1) * out_channels];
            if out_channels == 1 && count > 1 {
                let sum: f32 = self.channels.iter().map(|c| c[i]).sum();
                frame[0] = sum / count as f32;
                continue;
            }
            for (c, sample) in frame.iter_mut().enumerate() {
                *sample = if c < count { self.channels[c][i] } else { 0.0 };
            }
        }
    }

    /// Largest absolute sample across all channels.
    pub fn peak(&self) -> f32 {
        self.channels()
            .flat_map(|c| c.iter())
            .fold(0.0, |acc: f32, s| acc.max(s.abs()))
    }
}

/// Which fields of an [`AudioTimeStamp`] carry meaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TimeStampFlags {
    /// `sample_time` is valid.
    pub sample_time_valid: bool,
    /// `host_time` is valid.
    pub host_time_valid: bool,
}

impl TimeStampFlags {
    /// Only the sample time is valid.
    pub const SAMPLE_TIME_VALID: Self = Self {
        sample_time_valid: true,
        host_time_valid: false,
    };
}

/// Timestamp passed with every render call.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct AudioTimeStamp {
    /// Position of the block's first frame, in samples.
    pub sample_time: f64,
    /// Host clock time in nanoseconds.
    pub host_time: u64,
    /// Valid fields.
    pub flags: TimeStampFlags,
}

impl AudioTimeStamp {
    /// A sample-time-only timestamp.
    pub fn from_sample_time(sample_time: f64) -> Self {
        Self {
            sample_time,
            host_time: 0,
            flags: TimeStampFlags::SAMPLE_TIME_VALID,
        }
    }
}
