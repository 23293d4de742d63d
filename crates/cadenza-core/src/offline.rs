//! Offline pull render loop.
//!
//! Each iteration renders one block from the output unit, writes it to the
//! file sink and polls the transport, strictly in that order. The loop ends
//! once the polled position reaches the session length; there is no other
//! exit besides an error.

use crate::buffer::{AudioBufferList, AudioTimeStamp};
use crate::configure::RenderParameters;
use crate::report::Reporter;
use crate::status::{CheckStatus, Result, Status};
use crate::transport::Transport;
use crate::unit::AudioUnit;

/// Seconds of rendered audio between progress reports.
pub const PROGRESS_INTERVAL_SECONDS: f64 = 10.0;

/// Destination for rendered blocks.
pub trait FileSink {
    /// Appends the first `frames` frames of `buffer`.
    fn write(&mut self, frames: u32, buffer: &AudioBufferList) -> std::result::Result<(), Status>;

    /// Flushes and closes the sink.
    fn finish(&mut self) -> std::result::Result<(), Status> {
        Ok(())
    }
}

/// What an offline render produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSummary {
    /// Render/write iterations performed.
    pub blocks: u64,
    /// Frames written.
    pub frames: u64,
    /// Transport position after the last block, in beats.
    pub final_time: f64,
}

/// Block-based pull renderer.
#[derive(Debug, Clone)]
pub struct OfflineRenderer {
    frames_per_block: u32,
    sample_rate: f64,
    channels: usize,
}

impl OfflineRenderer {
    /// Renderer for stereo blocks of `params.frames_per_block` frames.
    pub fn new(params: &RenderParameters) -> Self {
        Self {
            frames_per_block: params.frames_per_block,
            sample_rate: params.sample_rate,
            channels: 2,
        }
    }

    /// Overrides the channel count of the render buffer.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    /// Blocks between progress reports: about ten seconds of audio, at least one.
    pub fn blocks_per_report(&self) -> u64 {
        let block_seconds = f64::from(self.frames_per_block) / self.sample_rate;
        let blocks = (PROGRESS_INTERVAL_SECONDS / block_seconds) as u64;
        blocks.max(1)
    }

    /// Renders until `transport` reaches `length` beats.
    ///
    /// The render timestamp starts at sample 0 and advances by one block per
    /// iteration. At least one block is always rendered.
    pub fn render<U, F, T>(
        &self,
        output: &mut U,
        sink: &mut F,
        transport: &T,
        length: f64,
        reporter: &mut dyn Reporter,
    ) -> Result<RenderSummary>
    where
        U: AudioUnit + ?Sized,
        F: FileSink + ?Sized,
        T: Transport + ?Sized,
    {
        let frames = self.frames_per_block;
        let mut buffer = AudioBufferList::new(self.channels, frames as usize);
        let mut timestamp = AudioTimeStamp::from_sample_time(0.0);
        let report_every = self.blocks_per_report();
        let mut blocks = 0_u64;

        loop {
            buffer.prepare(frames as usize);
            output
                .render(&timestamp, frames, &mut buffer)
                .check("AudioUnitRender")?;
            timestamp.sample_time += f64::from(frames);

            sink.write(frames, &buffer).check("FileWrite")?;

            let now = transport.current_time().check("PlayerGetTime")?;
            blocks += 1;
            if blocks % report_every == 0 {
                reporter.render_progress(now, length);
            }

            if now >= length {
                tracing::info!(blocks, beats = now, "offline render finished");
                return Ok(RenderSummary {
                    blocks,
                    frames: blocks * u64::from(frames),
                    final_time: now,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_cadence_is_ten_seconds_of_audio() {
        let renderer = OfflineRenderer::new(&RenderParameters::offline(44100.0, 512));
        // 512 frames at 44.1 kHz is ~11.6 ms, so ~861 blocks per ten seconds.
        assert_eq!(renderer.blocks_per_report(), 861);
    }

    #[test]
    fn report_cadence_never_drops_to_zero() {
        let renderer = OfflineRenderer::new(&RenderParameters::offline(8000.0, 200_000));
        assert_eq!(renderer.blocks_per_report(), 1);
    }
}
