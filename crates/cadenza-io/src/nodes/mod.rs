//! Processing nodes hosted by [`SoftwareGraph`](crate::SoftwareGraph).
//!
//! A node renders one block at a time from an optional upstream block. The
//! graph owns scheduling, buffers and slice limits; nodes only transform
//! samples and hold their own properties.

mod limiter;
mod output;
mod synth;

pub use limiter::PeakLimiter;
pub use output::OutputNode;
pub use synth::{MAX_VOICES, SynthNode, Waveform};

use cadenza_core::{AudioBufferList, ComponentDescriptor, Status};
use std::path::PathBuf;

/// A settable node property other than sample rate and slice limit.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// Device I/O buffer size in frames.
    BufferFrameSize(u32),
    /// Synthesizer CPU load ceiling, in `(0, 1]`.
    CpuLoadCeiling(f32),
    /// Sound bank file for the synthesizer.
    SoundBank(PathBuf),
    /// Stream synthesizer samples from disk.
    StreamFromDisk(bool),
    /// The synthesizer renders faster than real time.
    OfflineRender(bool),
}

/// A processing node.
pub trait Node: Send {
    /// What kind of component this node is.
    fn descriptor(&self) -> ComponentDescriptor;

    /// Sets the processing sample rate.
    fn set_sample_rate(&mut self, sample_rate: f64) -> Result<(), Status>;

    /// Current processing sample rate.
    fn sample_rate(&self) -> f64;

    /// Sets a node-specific property.
    fn set_property(&mut self, property: Property) -> Result<(), Status> {
        tracing::debug!(descriptor = %self.descriptor(), ?property, "unsupported property");
        Err(Status::INVALID_PROPERTY)
    }

    /// Device buffer size requested through [`Property::BufferFrameSize`].
    fn buffer_frames(&self) -> Option<u32> {
        None
    }

    /// Clears internal state. Called when the graph is initialized.
    fn reset(&mut self) {}

    /// Renders `output.frames()` frames. `output` arrives zeroed.
    fn process(
        &mut self,
        input: Option<&AudioBufferList>,
        output: &mut AudioBufferList,
    ) -> Result<(), Status>;
}
