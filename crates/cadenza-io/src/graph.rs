//! In-process processing graph.
//!
//! Nodes live in one [`GraphCore`] behind a mutex. Each node has at most one
//! input bus; rendering a node pulls its source first, recursively, and every
//! node renders at most once per render cycle, so a source feeding several
//! destinations is not advanced twice. Connections that would form a cycle
//! are rejected.
//!
//! Live playback runs on the device thread: the render callback upgrades a
//! weak reference to the graph, `try_lock`s the core (rendering silence if
//! the control thread holds it), renders the device output node in chunks of
//! at most its slice limit, and measures itself against the buffer's
//! real-time budget. Over-budget callbacks notify every registered overload
//! listener and update the CPU load figure.

use crate::clock::PlaybackClock;
use crate::device::{OutputDevice, RenderCallback, StreamHandle};
use crate::nodes::{Node, OutputNode, PeakLimiter, SynthNode};
use crate::score::Score;
use crate::unit::SoftwareUnit;
use cadenza_core::{
    AudioBufferList, AudioTimeStamp, ComponentDescriptor, NodeId, OverloadMonitor,
    ProcessingGraph, Status,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

/// Slice limit of a node nobody configured.
pub(crate) const DEFAULT_MAX_FRAMES: u32 = 1156;

/// Sample rate given to nodes created before configuration.
const DEFAULT_SAMPLE_RATE: f64 = 44100.0;

pub(crate) struct Slot {
    pub(crate) id: NodeId,
    pub(crate) node: Box<dyn Node>,
    pub(crate) max_frames: u32,
    output: AudioBufferList,
    cycle: u64,
}

/// Nodes, edges, and render state.
pub(crate) struct GraphCore {
    slots: Vec<Slot>,
    /// Destination `(node, bus)` to source `(node, bus)`.
    edges: BTreeMap<(NodeId, u32), (NodeId, u32)>,
    next_id: u32,
    open: bool,
    initialized: bool,
    cycle: u64,
    score: Arc<Score>,
    clock: PlaybackClock,
    device_rate: f64,
    pub(crate) listeners: Vec<Arc<OverloadMonitor>>,
}

impl GraphCore {
    fn index_of(&self, node: NodeId) -> Result<usize, Status> {
        self.slots
            .iter()
            .position(|s| s.id == node)
            .ok_or(Status::NODE_NOT_FOUND)
    }

    pub(crate) fn slot(&self, node: NodeId) -> Result<&Slot, Status> {
        let index = self.index_of(node)?;
        Ok(&self.slots[index])
    }

    pub(crate) fn slot_mut(&mut self, node: NodeId) -> Result<&mut Slot, Status> {
        let index = self.index_of(node)?;
        Ok(&mut self.slots[index])
    }

    fn create_node(&self, descriptor: ComponentDescriptor) -> Result<Box<dyn Node>, Status> {
        let node: Box<dyn Node> = if descriptor == ComponentDescriptor::SYNTH {
            Box::new(SynthNode::new(
                Arc::clone(&self.score),
                self.clock.clone(),
                DEFAULT_SAMPLE_RATE,
            ))
        } else if descriptor == ComponentDescriptor::PEAK_LIMITER {
            Box::new(PeakLimiter::new(DEFAULT_SAMPLE_RATE))
        } else if descriptor == ComponentDescriptor::DEVICE_OUTPUT {
            Box::new(OutputNode::device(self.device_rate, self.clock.clone()))
        } else if descriptor == ComponentDescriptor::GENERIC_OUTPUT {
            Box::new(OutputNode::generic(DEFAULT_SAMPLE_RATE, self.clock.clone()))
        } else {
            tracing::warn!(%descriptor, "no such component");
            return Err(Status::COMPONENT_NOT_FOUND);
        };
        Ok(node)
    }

    fn insert(&mut self, descriptor: ComponentDescriptor) -> Result<NodeId, Status> {
        let node = self.create_node(descriptor)?;
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.slots.push(Slot {
            id,
            node,
            max_frames: DEFAULT_MAX_FRAMES,
            output: AudioBufferList::stereo(0),
            cycle: 0,
        });
        Ok(id)
    }

    fn source_of(&self, node: NodeId) -> Option<NodeId> {
        self.edges.get(&(node, 0)).map(|(src, _)| *src)
    }

    /// Returns `true` if `target` is `node` or lies upstream of it.
    fn reaches(&self, node: NodeId, target: NodeId) -> bool {
        let mut current = Some(node);
        let mut steps = 0;
        while let Some(id) = current {
            if id == target {
                return true;
            }
            steps += 1;
            if steps > self.slots.len() {
                return true;
            }
            current = self.source_of(id);
        }
        false
    }

    /// Renders `node` into `out`.
    pub(crate) fn render(
        &mut self,
        node: NodeId,
        timestamp: &AudioTimeStamp,
        frames: u32,
        out: &mut AudioBufferList,
    ) -> Result<(), Status> {
        if !self.initialized {
            return Err(Status::UNINITIALIZED);
        }
        let index = self.index_of(node)?;
        if frames > self.slots[index].max_frames {
            return Err(Status::TOO_MANY_FRAMES);
        }
        tracing::trace!(node = %node, sample_time = timestamp.sample_time, frames, "render");
        self.cycle += 1;
        self.pull(node, frames as usize)?;
        out.copy_from(&self.slots[index].output);
        Ok(())
    }

    fn pull(&mut self, node: NodeId, frames: usize) -> Result<(), Status> {
        let index = self.index_of(node)?;
        if self.slots[index].cycle == self.cycle {
            return Ok(());
        }

        let source = match self.source_of(node) {
            Some(source) => {
                self.pull(source, frames)?;
                let source_index = self.index_of(source)?;
                let buffer = std::mem::take(&mut self.slots[source_index].output);
                Some((source_index, buffer))
            }
            None => None,
        };

        let slot = &mut self.slots[index];
        slot.cycle = self.cycle;
        slot.output.prepare(frames);
        let input = source.as_ref().map(|(_, buffer)| buffer);
        let result = slot.node.process(input, &mut slot.output);

        if let Some((source_index, buffer)) = source {
            self.slots[source_index].output = buffer;
        }
        result
    }

    fn first_device_output(&self) -> Option<NodeId> {
        self.slots
            .iter()
            .find(|s| s.node.descriptor() == ComponentDescriptor::DEVICE_OUTPUT)
            .map(|s| s.id)
    }
}

struct Shared {
    core: Mutex<GraphCore>,
    device: Mutex<Box<dyn OutputDevice>>,
    stream: Mutex<Option<StreamHandle>>,
    /// Last callback's render time over its real-time budget, as `f32` bits.
    cpu_load: AtomicU32,
}

/// Handle to an in-process processing graph. Clones share the graph.
#[derive(Clone)]
pub struct SoftwareGraph {
    shared: Arc<Shared>,
}

impl fmt::Debug for SoftwareGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.lock();
        f.debug_struct("SoftwareGraph")
            .field("nodes", &core.slots.len())
            .field("open", &core.open)
            .field("initialized", &core.initialized)
            .finish_non_exhaustive()
    }
}

impl SoftwareGraph {
    /// An empty graph whose synthesizers play `score` and whose device
    /// outputs stream to `device`.
    pub fn new(score: Arc<Score>, clock: PlaybackClock, device: Box<dyn OutputDevice>) -> Self {
        let device_rate = f64::from(device.sample_rate());
        let core = GraphCore {
            slots: Vec::new(),
            edges: BTreeMap::new(),
            next_id: 1,
            open: false,
            initialized: false,
            cycle: 0,
            score,
            clock,
            device_rate,
            listeners: Vec::new(),
        };
        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                device: Mutex::new(device),
                stream: Mutex::new(None),
                cpu_load: AtomicU32::new(0.0_f32.to_bits()),
            }),
        }
    }

    /// The graph a sequence plays through: synthesizer → limiter → device.
    pub fn with_default_chain(
        score: Arc<Score>,
        clock: PlaybackClock,
        device: Box<dyn OutputDevice>,
    ) -> Self {
        let graph = Self::new(score, clock, device);
        {
            let mut core = graph.lock();
            let chain = [
                ComponentDescriptor::SYNTH,
                ComponentDescriptor::PEAK_LIMITER,
                ComponentDescriptor::DEVICE_OUTPUT,
            ]
            .map(|descriptor| core.insert(descriptor));
            if let [Ok(synth), Ok(limiter), Ok(output)] = chain {
                core.edges.insert((limiter, 0), (synth, 0));
                core.edges.insert((output, 0), (limiter, 0));
            }
        }
        graph
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, GraphCore> {
        self.shared
            .core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Source feeding `node`'s input bus, if connected.
    pub fn source_of(&self, node: NodeId) -> Option<NodeId> {
        self.lock().source_of(node)
    }

    /// Returns `true` if the graph has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Name of the graph's output device.
    pub fn device_name(&self) -> String {
        self.shared
            .device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .name()
            .to_string()
    }

    /// Returns `true` while a device stream is running.
    pub fn is_streaming(&self) -> bool {
        self.shared
            .stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Starts streaming the device output node to the device.
    ///
    /// Does nothing when the graph has no device output (offline topology) or
    /// the stream already runs.
    pub fn start_device(&self) -> crate::Result<()> {
        let mut stream = self
            .shared
            .stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if stream.is_some() {
            return Ok(());
        }

        let (node, sample_rate, buffer_frames) = {
            let core = self.lock();
            let Some(node) = core.first_device_output() else {
                tracing::debug!("no device output; nothing to stream");
                return Ok(());
            };
            let slot = core.slot(node).map_err(|_| crate::Error::NoDevice)?;
            (
                node,
                slot.node.sample_rate(),
                slot.node.buffer_frames().unwrap_or(slot.max_frames),
            )
        };

        let mut device = self
            .shared
            .device
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let channels = usize::from(device.channels()).max(1);
        let callback = render_callback(Arc::downgrade(&self.shared), node, channels, sample_rate);
        *stream = Some(device.start(buffer_frames, callback)?);
        tracing::info!(device = device.name(), node = %node, sample_rate, "device stream started");
        Ok(())
    }

    /// Stops the device stream, if running.
    pub fn stop_device(&self) {
        let handle = self
            .shared
            .stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if handle.is_some() {
            tracing::info!("device stream stopped");
        }
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.lock();
        writeln!(
            f,
            "Graph: {} nodes{}",
            core.slots.len(),
            if core.initialized { ", initialized" } else { "" }
        )?;
        for slot in &core.slots {
            write!(
                f,
                "  {} {} @ {} Hz, max {} frames",
                slot.id,
                slot.node.descriptor(),
                slot.node.sample_rate(),
                slot.max_frames
            )?;
            if let Some(source) = core.source_of(slot.id) {
                write!(f, " <- {source}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for SoftwareGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.describe(f)
    }
}

fn render_callback(
    shared: Weak<Shared>,
    node: NodeId,
    channels: usize,
    sample_rate: f64,
) -> RenderCallback {
    let mut scratch = AudioBufferList::stereo(0);
    let mut sample_time = 0.0;

    Box::new(move |data: &mut [f32]| {
        let Some(shared) = shared.upgrade() else {
            data.fill(0.0);
            return;
        };
        let started = Instant::now();
        let frames = data.len() / channels;

        let Ok(mut core) = shared.core.try_lock() else {
            data.fill(0.0);
            return;
        };
        let max_frames = core.slot(node).map_or(0, |s| s.max_frames as usize);
        if max_frames == 0 {
            data.fill(0.0);
            return;
        }

        let mut offset = 0;
        while offset < frames {
            let chunk = (frames - offset).min(max_frames);
            let timestamp = AudioTimeStamp::from_sample_time(sample_time);
            let out = &mut data[offset * channels..(offset + chunk) * channels];
            match core.render(node, &timestamp, chunk as u32, &mut scratch) {
                Ok(()) => scratch.interleave_into(out, channels),
                Err(status) => {
                    out.fill(0.0);
                    tracing::trace!(%status, "device render failed");
                }
            }
            sample_time += chunk as f64;
            offset += chunk;
        }

        let budget = frames as f64 / sample_rate;
        let elapsed = started.elapsed().as_secs_f64();
        if budget > 0.0 {
            let load = (elapsed / budget) as f32;
            shared.cpu_load.store(load.to_bits(), Ordering::Relaxed);
            if elapsed > budget {
                for listener in &core.listeners {
                    listener.notify();
                }
            }
        }
    })
}

impl ProcessingGraph for SoftwareGraph {
    type Unit = SoftwareUnit;

    fn open(&mut self) -> Result<(), Status> {
        self.lock().open = true;
        Ok(())
    }

    fn node_count(&self) -> Result<usize, Status> {
        Ok(self.lock().slots.len())
    }

    fn node_at(&self, index: usize) -> Result<NodeId, Status> {
        self.lock()
            .slots
            .get(index)
            .map(|s| s.id)
            .ok_or(Status::NODE_NOT_FOUND)
    }

    fn node_descriptor(&self, node: NodeId) -> Result<ComponentDescriptor, Status> {
        Ok(self.lock().slot(node)?.node.descriptor())
    }

    fn node_unit(&self, node: NodeId) -> Result<SoftwareUnit, Status> {
        self.lock().slot(node)?;
        Ok(SoftwareUnit::new(self.clone(), node))
    }

    fn remove_node(&mut self, node: NodeId) -> Result<(), Status> {
        let mut core = self.lock();
        if !core.open {
            return Err(Status::CANNOT_DO_IN_CURRENT_CONTEXT);
        }
        let index = core.index_of(node)?;
        core.slots.remove(index);
        core.edges
            .retain(|(dest, _), (src, _)| *dest != node && *src != node);
        tracing::debug!(node = %node, "removed node");
        Ok(())
    }

    fn add_node(&mut self, descriptor: ComponentDescriptor) -> Result<NodeId, Status> {
        let mut core = self.lock();
        if !core.open {
            return Err(Status::CANNOT_DO_IN_CURRENT_CONTEXT);
        }
        let id = core.insert(descriptor)?;
        tracing::debug!(node = %id, %descriptor, "added node");
        Ok(id)
    }

    fn connect(
        &mut self,
        source: NodeId,
        source_bus: u32,
        dest: NodeId,
        dest_bus: u32,
    ) -> Result<(), Status> {
        let mut core = self.lock();
        if !core.open {
            return Err(Status::CANNOT_DO_IN_CURRENT_CONTEXT);
        }
        core.index_of(source)?;
        core.index_of(dest)?;
        if source_bus != 0 || dest_bus != 0 || core.reaches(source, dest) {
            return Err(Status::INVALID_CONNECTION);
        }
        core.edges
            .insert((dest, dest_bus), (source, source_bus));
        Ok(())
    }

    fn initialize(&mut self) -> Result<(), Status> {
        let mut core = self.lock();
        if !core.open {
            return Err(Status::CANNOT_DO_IN_CURRENT_CONTEXT);
        }
        for slot in &mut core.slots {
            slot.output = AudioBufferList::stereo(slot.max_frames as usize);
            slot.cycle = 0;
            slot.node.reset();
        }
        core.cycle = 0;
        core.initialized = true;
        tracing::debug!(nodes = core.slots.len(), "graph initialized");
        Ok(())
    }

    fn cpu_load(&self) -> Result<f32, Status> {
        Ok(f32::from_bits(self.shared.cpu_load.load(Ordering::Relaxed)))
    }
}
