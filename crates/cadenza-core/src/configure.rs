//! Graph discovery and topology configuration.
//!
//! [`configure_graph`] turns a sequence's graph into one that renders either
//! to a live device or to an offline pull endpoint, and propagates the
//! session's sample rate and block size to every node. It runs in two phases:
//!
//! 1. **Output phase.** Find the first output-type node and reconfigure it for
//!    the render mode. In live mode the device keeps its node; its buffer size
//!    is set, the overload listener is registered, and its native sample rate
//!    is read back into [`RenderParameters`]. In offline mode the device node
//!    is removed and replaced by a generic output running at the configured
//!    sample rate.
//! 2. **Propagation phase.** Visit every node of the (possibly rewired) graph
//!    once. Non-output nodes get the session sample rate and, offline, their
//!    primary output is routed into the new output node; the synthesizer is
//!    the exception, its signal already reaches the output through the
//!    existing chain. Every node, the output included, gets the block size
//!    as its slice limit.
//!
//! Splitting the phases means the output node is known before any other node
//! is touched, so node order shifts caused by the replacement never matter.

use crate::component::{ComponentDescriptor, ComponentSubtype, NodeId};
use crate::graph::ProcessingGraph;
use crate::overload::OverloadMonitor;
use crate::status::{CheckStatus, Error, Result};
use crate::unit::AudioUnit;
use std::sync::Arc;

/// Default frames per render block.
pub const DEFAULT_FRAMES_PER_BLOCK: u32 = 512;

/// Where rendered audio goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Real-time playback through the audio device.
    Live,
    /// Faster-than-real-time rendering into a file.
    Offline,
}

/// Session-wide render settings.
///
/// The sample rate is authoritative from the device in [`RenderMode::Live`]
/// (it is overwritten during configuration) and from the caller in
/// [`RenderMode::Offline`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParameters {
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Frames per render block; also every node's slice limit.
    pub frames_per_block: u32,
    /// Target topology.
    pub mode: RenderMode,
}

impl RenderParameters {
    /// Live playback parameters; the sample rate is filled in by the device.
    pub fn live(frames_per_block: u32) -> Self {
        Self {
            sample_rate: 0.0,
            frames_per_block,
            mode: RenderMode::Live,
        }
    }

    /// Offline render parameters at a caller-chosen sample rate.
    pub fn offline(sample_rate: f64, frames_per_block: u32) -> Self {
        Self {
            sample_rate,
            frames_per_block,
            mode: RenderMode::Offline,
        }
    }

    /// Duration of one block in seconds.
    pub fn block_seconds(&self) -> f64 {
        f64::from(self.frames_per_block) / self.sample_rate
    }
}

/// A node together with its unit handle.
#[derive(Debug, Clone)]
pub struct NodeHandle<U> {
    /// Node in the graph.
    pub node: NodeId,
    /// Its unit.
    pub unit: U,
}

/// Finds the synthesizer node.
///
/// Fails with [`Error::NotFound`] when the graph has no synthesizer and with
/// [`Error::MultipleSynths`] when it has more than one.
pub fn locate_synth<G: ProcessingGraph>(graph: &G) -> Result<NodeHandle<G::Unit>> {
    let count = graph.node_count().check("GraphGetNodeCount")?;
    let mut found = Vec::new();
    for index in 0..count {
        let node = graph.node_at(index).check("GraphGetIndNode")?;
        let descriptor = graph.node_descriptor(node).check("GraphNodeInfo")?;
        if descriptor.is_synth() {
            found.push(node);
        }
    }

    match found.as_slice() {
        [] => Err(Error::NotFound("synthesizer")),
        [node] => {
            let unit = graph.node_unit(*node).check("GraphNodeInfo")?;
            tracing::debug!(node = %node, "located synthesizer");
            Ok(NodeHandle { node: *node, unit })
        }
        nodes => Err(Error::MultipleSynths(nodes.len())),
    }
}

/// Finds the first output-type node without modifying the graph.
pub fn find_output<G: ProcessingGraph>(graph: &G) -> Result<NodeHandle<G::Unit>> {
    let (node, _) = first_output(graph)?;
    let unit = graph.node_unit(node).check("GraphNodeInfo")?;
    Ok(NodeHandle { node, unit })
}

fn first_output<G: ProcessingGraph>(graph: &G) -> Result<(NodeId, ComponentDescriptor)> {
    let count = graph.node_count().check("GraphGetNodeCount")?;
    for index in 0..count {
        let node = graph.node_at(index).check("GraphGetIndNode")?;
        let descriptor = graph.node_descriptor(node).check("GraphNodeInfo")?;
        if descriptor.is_output() {
            return Ok((node, descriptor));
        }
    }
    Err(Error::NotFound("output"))
}

/// Rewires `graph` for `params.mode` and propagates render settings.
///
/// Returns the active output node. In live mode, `overloads` is registered
/// with the device and `params.sample_rate` is replaced by the device rate.
///
/// Any failing collaborator call aborts configuration; the graph is left as
/// it was at the point of failure.
pub fn configure_graph<G: ProcessingGraph>(
    graph: &mut G,
    params: &mut RenderParameters,
    overloads: &Arc<OverloadMonitor>,
) -> Result<NodeHandle<G::Unit>> {
    let output = match params.mode {
        RenderMode::Live => prepare_device_output(graph, params, overloads)?,
        RenderMode::Offline => replace_with_generic_output(graph, params)?,
    };
    propagate(graph, params, output.node)?;

    tracing::info!(
        output = %output.node,
        mode = ?params.mode,
        sample_rate = params.sample_rate,
        frames_per_block = params.frames_per_block,
        "graph configured"
    );
    Ok(output)
}

fn prepare_device_output<G: ProcessingGraph>(
    graph: &mut G,
    params: &mut RenderParameters,
    overloads: &Arc<OverloadMonitor>,
) -> Result<NodeHandle<G::Unit>> {
    let (node, _) = first_output(graph)?;
    let mut unit = graph.node_unit(node).check("GraphNodeInfo")?;

    unit.set_buffer_frame_size(params.frames_per_block)
        .check("SetProperty: BufferFrameSize")?;
    unit.add_overload_listener(Arc::clone(overloads))
        .check("AddPropertyListener: ProcessorOverload")?;
    params.sample_rate = unit.sample_rate().check("GetProperty: SampleRate")?;

    tracing::debug!(node = %node, sample_rate = params.sample_rate, "device output ready");
    Ok(NodeHandle { node, unit })
}

fn replace_with_generic_output<G: ProcessingGraph>(
    graph: &mut G,
    params: &RenderParameters,
) -> Result<NodeHandle<G::Unit>> {
    let (device, mut descriptor) = first_output(graph)?;
    graph.remove_node(device).check("GraphRemoveNode")?;

    descriptor.subtype = ComponentSubtype::GenericOutput;
    let node = graph.add_node(descriptor).check("GraphAddNode")?;
    let mut unit = graph.node_unit(node).check("GraphNodeInfo")?;
    unit.set_sample_rate(params.sample_rate)
        .check("SetProperty: SampleRate")?;

    tracing::debug!(removed = %device, added = %node, "replaced device output with generic output");
    Ok(NodeHandle { node, unit })
}

fn propagate<G: ProcessingGraph>(
    graph: &mut G,
    params: &RenderParameters,
    output: NodeId,
) -> Result<()> {
    let count = graph.node_count().check("GraphGetNodeCount")?;
    for index in 0..count {
        let node = graph.node_at(index).check("GraphGetIndNode")?;
        let descriptor = graph.node_descriptor(node).check("GraphNodeInfo")?;
        let mut unit = graph.node_unit(node).check("GraphNodeInfo")?;

        if !descriptor.is_output() {
            if params.mode == RenderMode::Offline && !descriptor.is_synth() {
                graph
                    .connect(node, 0, output, 0)
                    .check("GraphConnectNodeInput")?;
                tracing::debug!(node = %node, output = %output, "routed into generic output");
            }
            unit.set_sample_rate(params.sample_rate)
                .check("SetProperty: SampleRate")?;
        }

        unit.set_max_frames_per_slice(params.frames_per_block)
            .check("SetProperty: MaximumFramesPerSlice")?;
    }
    Ok(())
}
