//! Parameter and render interface of a graph node's unit.

use crate::buffer::{AudioBufferList, AudioTimeStamp};
use crate::overload::OverloadMonitor;
use crate::status::Status;
use std::path::Path;
use std::sync::Arc;

/// Handle to the processing unit behind a graph node.
///
/// Handles are cheap to clone and refer to state owned by the graph; dropping
/// one never disposes the unit. Every node supports the slice-size and
/// sample-rate properties. The remaining properties are specific to device
/// outputs or synthesizers, and default to [`Status::INVALID_PROPERTY`] so a
/// unit only implements what its component actually has.
pub trait AudioUnit {
    /// Largest number of frames a single render call may request.
    fn set_max_frames_per_slice(&mut self, frames: u32) -> Result<(), Status>;

    /// Current slice limit.
    fn max_frames_per_slice(&self) -> Result<u32, Status>;

    /// Sample rate of the unit's output.
    fn set_sample_rate(&mut self, sample_rate: f64) -> Result<(), Status>;

    /// Current output sample rate.
    fn sample_rate(&self) -> Result<f64, Status>;

    /// I/O buffer size of a device output, in frames.
    fn set_buffer_frame_size(&mut self, _frames: u32) -> Result<(), Status> {
        Err(Status::INVALID_PROPERTY)
    }

    /// Registers a listener notified on every device overload.
    ///
    /// The listener is invoked on the device's real-time thread.
    fn add_overload_listener(&mut self, _listener: Arc<OverloadMonitor>) -> Result<(), Status> {
        Err(Status::INVALID_PROPERTY)
    }

    /// Synthesizer CPU load ceiling in `(0, 1]`.
    fn set_cpu_load_ceiling(&mut self, _ceiling: f32) -> Result<(), Status> {
        Err(Status::INVALID_PROPERTY)
    }

    /// Synthesizer sound bank.
    fn set_sound_bank(&mut self, _path: &Path) -> Result<(), Status> {
        Err(Status::INVALID_PROPERTY)
    }

    /// Whether the synthesizer streams its samples from disk.
    fn set_stream_from_disk(&mut self, _enabled: bool) -> Result<(), Status> {
        Err(Status::INVALID_PROPERTY)
    }

    /// Tells the unit it is being rendered faster than real time.
    fn set_offline_render(&mut self, _enabled: bool) -> Result<(), Status> {
        Err(Status::INVALID_PROPERTY)
    }

    /// Renders `frames` frames into `buffer`, pulling upstream nodes.
    fn render(
        &mut self,
        _timestamp: &AudioTimeStamp,
        _frames: u32,
        _buffer: &mut AudioBufferList,
    ) -> Result<(), Status> {
        Err(Status::CANNOT_DO_IN_CURRENT_CONTEXT)
    }
}
