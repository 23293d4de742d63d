//! Output nodes: the device endpoint and the generic pull endpoint.

use super::{Node, Property};
use crate::clock::PlaybackClock;
use cadenza_core::{AudioBufferList, ComponentDescriptor, Status};

/// Terminal node of a graph.
///
/// Passes its input through and advances the playback clock by every block
/// it renders. A device output runs at the device's native rate and accepts a
/// buffer frame size; a generic output runs at whatever rate it is given.
#[derive(Debug, Clone)]
pub struct OutputNode {
    descriptor: ComponentDescriptor,
    sample_rate: f64,
    buffer_frames: Option<u32>,
    clock: PlaybackClock,
}

impl OutputNode {
    /// Device output fixed at `device_rate`.
    pub fn device(device_rate: f64, clock: PlaybackClock) -> Self {
        Self {
            descriptor: ComponentDescriptor::DEVICE_OUTPUT,
            sample_rate: device_rate,
            buffer_frames: None,
            clock,
        }
    }

    /// Generic output at `sample_rate`.
    pub fn generic(sample_rate: f64, clock: PlaybackClock) -> Self {
        Self {
            descriptor: ComponentDescriptor::GENERIC_OUTPUT,
            sample_rate,
            buffer_frames: None,
            clock,
        }
    }

    fn is_device(&self) -> bool {
        self.descriptor == ComponentDescriptor::DEVICE_OUTPUT
    }
}

impl Node for OutputNode {
    fn descriptor(&self) -> ComponentDescriptor {
        self.descriptor
    }

    fn set_sample_rate(&mut self, sample_rate: f64) -> Result<(), Status> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(Status::INVALID_PROPERTY_VALUE);
        }
        if self.is_device() && sample_rate != self.sample_rate {
            return Err(Status::FORMAT_NOT_SUPPORTED);
        }
        self.sample_rate = sample_rate;
        Ok(())
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn buffer_frames(&self) -> Option<u32> {
        self.buffer_frames
    }

    fn set_property(&mut self, property: Property) -> Result<(), Status> {
        match property {
            Property::BufferFrameSize(frames) if self.is_device() => {
                if frames == 0 {
                    return Err(Status::INVALID_PROPERTY_VALUE);
                }
                self.buffer_frames = Some(frames);
                Ok(())
            }
            _ => Err(Status::INVALID_PROPERTY),
        }
    }

    fn process(
        &mut self,
        input: Option<&AudioBufferList>,
        output: &mut AudioBufferList,
    ) -> Result<(), Status> {
        let frames = output.frames();
        if let Some(input) = input {
            output.copy_from(input);
        }
        self.clock.advance(frames as u32, self.sample_rate);
        Ok(())
    }
}
