//! Unit handles into a [`SoftwareGraph`].

use crate::graph::SoftwareGraph;
use crate::nodes::Property;
use cadenza_core::{
    AudioBufferList, AudioTimeStamp, AudioUnit, ComponentDescriptor, NodeId, OverloadMonitor,
    Status,
};
use std::path::Path;
use std::sync::Arc;

/// Property access to one node of a [`SoftwareGraph`].
///
/// Every call locks the graph; a handle whose node was removed reports
/// [`Status::NODE_NOT_FOUND`].
#[derive(Debug, Clone)]
pub struct SoftwareUnit {
    graph: SoftwareGraph,
    node: NodeId,
}

impl SoftwareUnit {
    pub(crate) fn new(graph: SoftwareGraph, node: NodeId) -> Self {
        Self { graph, node }
    }

    /// The node this handle refers to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    fn set_property(&mut self, property: Property) -> Result<(), Status> {
        let mut core = self.graph.lock();
        core.slot_mut(self.node)?.node.set_property(property)
    }
}

impl AudioUnit for SoftwareUnit {
    fn set_max_frames_per_slice(&mut self, frames: u32) -> Result<(), Status> {
        if frames == 0 {
            return Err(Status::INVALID_PROPERTY_VALUE);
        }
        let mut core = self.graph.lock();
        core.slot_mut(self.node)?.max_frames = frames;
        Ok(())
    }

    fn max_frames_per_slice(&self) -> Result<u32, Status> {
        Ok(self.graph.lock().slot(self.node)?.max_frames)
    }

    fn set_sample_rate(&mut self, sample_rate: f64) -> Result<(), Status> {
        let mut core = self.graph.lock();
        core.slot_mut(self.node)?.node.set_sample_rate(sample_rate)
    }

    fn sample_rate(&self) -> Result<f64, Status> {
        Ok(self.graph.lock().slot(self.node)?.node.sample_rate())
    }

    fn set_buffer_frame_size(&mut self, frames: u32) -> Result<(), Status> {
        self.set_property(Property::BufferFrameSize(frames))
    }

    fn add_overload_listener(&mut self, listener: Arc<OverloadMonitor>) -> Result<(), Status> {
        let mut core = self.graph.lock();
        if core.slot(self.node)?.node.descriptor() != ComponentDescriptor::DEVICE_OUTPUT {
            return Err(Status::INVALID_PROPERTY);
        }
        core.listeners.push(listener);
        Ok(())
    }

    fn set_cpu_load_ceiling(&mut self, ceiling: f32) -> Result<(), Status> {
        self.set_property(Property::CpuLoadCeiling(ceiling))
    }

    fn set_sound_bank(&mut self, path: &Path) -> Result<(), Status> {
        self.set_property(Property::SoundBank(path.to_path_buf()))
    }

    fn set_stream_from_disk(&mut self, enabled: bool) -> Result<(), Status> {
        self.set_property(Property::StreamFromDisk(enabled))
    }

    fn set_offline_render(&mut self, enabled: bool) -> Result<(), Status> {
        self.set_property(Property::OfflineRender(enabled))
    }

    fn render(
        &mut self,
        timestamp: &AudioTimeStamp,
        frames: u32,
        buffer: &mut AudioBufferList,
    ) -> Result<(), Status> {
        self.graph
            .lock()
            .render(self.node, timestamp, frames, buffer)
    }
}
