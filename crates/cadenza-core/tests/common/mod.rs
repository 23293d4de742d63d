//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use cadenza_core::{
    AudioBufferList, AudioTimeStamp, AudioUnit, ComponentDescriptor, ComponentSubtype,
    ComponentType, FileSink, NodeId, OverloadMonitor, ProcessingGraph, Sequence, Status,
    Transport,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

/// Recorded property state of one mock unit.
#[derive(Debug, Default)]
pub struct UnitState {
    pub max_frames: Option<u32>,
    pub sample_rate: Option<f64>,
    pub buffer_frame_size: Option<u32>,
    pub listeners: Vec<Arc<OverloadMonitor>>,
    pub device_rate: Option<f64>,
    pub cpu_ceiling: Option<f32>,
    pub sound_bank: Option<PathBuf>,
    pub stream_from_disk: bool,
    pub offline_render: bool,
    pub sets: usize,
}

/// Unit handle sharing state with the graph.
#[derive(Debug, Clone)]
pub struct MockUnit {
    pub descriptor: ComponentDescriptor,
    pub state: Rc<RefCell<UnitState>>,
    /// Frames rendered so far, shared with [`MockTransport`].
    pub rendered: Rc<Cell<u64>>,
}

impl AudioUnit for MockUnit {
    fn set_max_frames_per_slice(&mut self, frames: u32) -> Result<(), Status> {
        let mut state = self.state.borrow_mut();
        state.max_frames = Some(frames);
        state.sets += 1;
        Ok(())
    }

    fn max_frames_per_slice(&self) -> Result<u32, Status> {
        self.state.borrow().max_frames.ok_or(Status::UNINITIALIZED)
    }

    fn set_sample_rate(&mut self, sample_rate: f64) -> Result<(), Status> {
        self.state.borrow_mut().sample_rate = Some(sample_rate);
        Ok(())
    }

    fn sample_rate(&self) -> Result<f64, Status> {
        let state = self.state.borrow();
        state
            .device_rate
            .or(state.sample_rate)
            .ok_or(Status::UNINITIALIZED)
    }

    fn set_buffer_frame_size(&mut self, frames: u32) -> Result<(), Status> {
        if self.descriptor != ComponentDescriptor::DEVICE_OUTPUT {
            return Err(Status::INVALID_PROPERTY);
        }
        self.state.borrow_mut().buffer_frame_size = Some(frames);
        Ok(())
    }

    fn add_overload_listener(&mut self, listener: Arc<OverloadMonitor>) -> Result<(), Status> {
        if self.descriptor != ComponentDescriptor::DEVICE_OUTPUT {
            return Err(Status::INVALID_PROPERTY);
        }
        self.state.borrow_mut().listeners.push(listener);
        Ok(())
    }

    fn set_cpu_load_ceiling(&mut self, ceiling: f32) -> Result<(), Status> {
        self.synth_only()?;
        self.state.borrow_mut().cpu_ceiling = Some(ceiling);
        Ok(())
    }

    fn set_sound_bank(&mut self, path: &Path) -> Result<(), Status> {
        self.synth_only()?;
        self.state.borrow_mut().sound_bank = Some(path.to_path_buf());
        Ok(())
    }

    fn set_stream_from_disk(&mut self, enabled: bool) -> Result<(), Status> {
        self.synth_only()?;
        self.state.borrow_mut().stream_from_disk = enabled;
        Ok(())
    }

    fn set_offline_render(&mut self, enabled: bool) -> Result<(), Status> {
        self.synth_only()?;
        self.state.borrow_mut().offline_render = enabled;
        Ok(())
    }

    fn render(
        &mut self,
        timestamp: &AudioTimeStamp,
        frames: u32,
        buffer: &mut AudioBufferList,
    ) -> Result<(), Status> {
        let limit = self.max_frames_per_slice()?;
        if frames > limit {
            return Err(Status::TOO_MANY_FRAMES);
        }
        assert_eq!(timestamp.sample_time, self.rendered.get() as f64);
        assert!(timestamp.flags.sample_time_valid);
        for channel in 0..buffer.channel_count() {
            buffer.channel_mut(channel).fill(0.25);
        }
        self.rendered.set(self.rendered.get() + u64::from(frames));
        Ok(())
    }
}

impl MockUnit {
    fn synth_only(&self) -> Result<(), Status> {
        if self.descriptor.is_synth() {
            Ok(())
        } else {
            Err(Status::INVALID_PROPERTY)
        }
    }
}

struct MockNode {
    id: NodeId,
    unit: MockUnit,
}

/// Graph of mock nodes with single-bus connections.
pub struct MockGraph {
    nodes: Vec<MockNode>,
    /// Destination `(node, bus)` to source `(node, bus)`.
    pub connections: HashMap<(NodeId, u32), (NodeId, u32)>,
    next_id: u32,
    pub device_rate: f64,
    pub cpu_load: f32,
    pub opened: bool,
    pub initialized: bool,
    pub removed: Vec<NodeId>,
    pub rendered: Rc<Cell<u64>>,
    /// Operation name that fails with [`Status::PARAM`].
    pub fail_on: Option<&'static str>,
}

impl MockGraph {
    /// Empty graph whose device outputs report `device_rate`.
    pub fn new(device_rate: f64) -> Self {
        Self {
            nodes: Vec::new(),
            connections: HashMap::new(),
            next_id: 1,
            device_rate,
            cpu_load: 0.125,
            opened: false,
            initialized: false,
            removed: Vec::new(),
            rendered: Rc::new(Cell::new(0)),
            fail_on: None,
        }
    }

    /// Synth → limiter → device output, the graph a sequence creates.
    pub fn sequence_default(device_rate: f64) -> (Self, [NodeId; 3]) {
        let mut graph = Self::new(device_rate);
        let synth = graph.push(ComponentDescriptor::SYNTH);
        let limiter = graph.push(ComponentDescriptor::PEAK_LIMITER);
        let output = graph.push(ComponentDescriptor::DEVICE_OUTPUT);
        graph.connections.insert((limiter, 0), (synth, 0));
        graph.connections.insert((output, 0), (limiter, 0));
        (graph, [synth, limiter, output])
    }

    /// Appends a node without going through the fallible trait method.
    pub fn push(&mut self, descriptor: ComponentDescriptor) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let state = UnitState {
            device_rate: (descriptor == ComponentDescriptor::DEVICE_OUTPUT)
                .then_some(self.device_rate),
            ..UnitState::default()
        };
        self.nodes.push(MockNode {
            id,
            unit: MockUnit {
                descriptor,
                state: Rc::new(RefCell::new(state)),
                rendered: Rc::clone(&self.rendered),
            },
        });
        id
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    pub fn state(&self, node: NodeId) -> Rc<RefCell<UnitState>> {
        Rc::clone(&self.find(node).expect("node exists").unit.state)
    }

    pub fn descriptor(&self, node: NodeId) -> ComponentDescriptor {
        self.find(node).expect("node exists").unit.descriptor
    }

    pub fn source_of(&self, node: NodeId) -> Option<NodeId> {
        self.connections.get(&(node, 0)).map(|(src, _)| *src)
    }

    fn find(&self, node: NodeId) -> Option<&MockNode> {
        self.nodes.iter().find(|n| n.id == node)
    }

    fn gate(&self, operation: &'static str) -> Result<(), Status> {
        if self.fail_on == Some(operation) {
            Err(Status::PARAM)
        } else {
            Ok(())
        }
    }
}

impl ProcessingGraph for MockGraph {
    type Unit = MockUnit;

    fn open(&mut self) -> Result<(), Status> {
        self.gate("open")?;
        self.opened = true;
        Ok(())
    }

    fn node_count(&self) -> Result<usize, Status> {
        self.gate("node_count")?;
        Ok(self.nodes.len())
    }

    fn node_at(&self, index: usize) -> Result<NodeId, Status> {
        self.nodes
            .get(index)
            .map(|n| n.id)
            .ok_or(Status::NODE_NOT_FOUND)
    }

    fn node_descriptor(&self, node: NodeId) -> Result<ComponentDescriptor, Status> {
        self.find(node)
            .map(|n| n.unit.descriptor)
            .ok_or(Status::NODE_NOT_FOUND)
    }

    fn node_unit(&self, node: NodeId) -> Result<MockUnit, Status> {
        self.find(node)
            .map(|n| n.unit.clone())
            .ok_or(Status::NODE_NOT_FOUND)
    }

    fn remove_node(&mut self, node: NodeId) -> Result<(), Status> {
        self.gate("remove_node")?;
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == node)
            .ok_or(Status::NODE_NOT_FOUND)?;
        self.nodes.remove(index);
        self.connections
            .retain(|(dest, _), (src, _)| *dest != node && *src != node);
        self.removed.push(node);
        Ok(())
    }

    fn add_node(&mut self, descriptor: ComponentDescriptor) -> Result<NodeId, Status> {
        self.gate("add_node")?;
        Ok(self.push(descriptor))
    }

    fn connect(
        &mut self,
        source: NodeId,
        source_bus: u32,
        dest: NodeId,
        dest_bus: u32,
    ) -> Result<(), Status> {
        self.gate("connect")?;
        if self.find(source).is_none() || self.find(dest).is_none() || source == dest {
            return Err(Status::INVALID_CONNECTION);
        }
        self.connections
            .insert((dest, dest_bus), (source, source_bus));
        Ok(())
    }

    fn initialize(&mut self) -> Result<(), Status> {
        self.gate("initialize")?;
        self.initialized = true;
        Ok(())
    }

    fn cpu_load(&self) -> Result<f32, Status> {
        Ok(self.cpu_load)
    }
}

/// Sequence of plain track lengths.
#[derive(Debug, Clone)]
pub struct MockSequence {
    pub lengths: Vec<f64>,
    pub muted: Vec<bool>,
}

impl MockSequence {
    pub fn new(lengths: &[f64]) -> Self {
        Self {
            lengths: lengths.to_vec(),
            muted: vec![false; lengths.len()],
        }
    }
}

impl Sequence for MockSequence {
    fn track_count(&self) -> Result<usize, Status> {
        Ok(self.lengths.len())
    }

    fn track_length(&self, index: usize) -> Result<f64, Status> {
        self.lengths.get(index).copied().ok_or(Status::PARAM)
    }

    fn set_track_muted(&mut self, index: usize, muted: bool) -> Result<(), Status> {
        *self.muted.get_mut(index).ok_or(Status::PARAM)? = muted;
        Ok(())
    }
}

/// Transport whose clock follows the frames rendered by a [`MockUnit`].
#[derive(Debug)]
pub struct MockTransport {
    pub rendered: Rc<Cell<u64>>,
    pub sample_rate: f64,
    pub beats_per_second: f64,
    pub start_beat: f64,
    pub started: bool,
    pub prerolled: bool,
    pub stopped: bool,
    pub polls: Cell<u32>,
}

impl MockTransport {
    pub fn new(rendered: Rc<Cell<u64>>, sample_rate: f64, bpm: f64) -> Self {
        Self {
            rendered,
            sample_rate,
            beats_per_second: bpm / 60.0,
            start_beat: 0.0,
            started: false,
            prerolled: false,
            stopped: false,
            polls: Cell::new(0),
        }
    }
}

impl Transport for MockTransport {
    fn set_time(&mut self, beats: f64) -> Result<(), Status> {
        self.start_beat = beats;
        Ok(())
    }

    fn preroll(&mut self) -> Result<(), Status> {
        self.prerolled = true;
        Ok(())
    }

    fn start(&mut self) -> Result<(), Status> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Status> {
        self.stopped = true;
        Ok(())
    }

    fn current_time(&self) -> Result<f64, Status> {
        self.polls.set(self.polls.get() + 1);
        let seconds = self.rendered.get() as f64 / self.sample_rate;
        Ok(self.start_beat + seconds * self.beats_per_second)
    }
}

/// Sink counting the frames written to it.
#[derive(Debug, Default)]
pub struct CountingSink {
    pub writes: u64,
    pub frames: u64,
    pub finished: bool,
    pub peak: f32,
}

impl FileSink for CountingSink {
    fn write(&mut self, frames: u32, buffer: &AudioBufferList) -> Result<(), Status> {
        assert_eq!(buffer.frames(), frames as usize);
        self.writes += 1;
        self.frames += u64::from(frames);
        self.peak = self.peak.max(buffer.peak());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Status> {
        self.finished = true;
        Ok(())
    }
}

/// A descriptor for an arbitrary effect subtype.
pub fn effect(code: &[u8; 4]) -> ComponentDescriptor {
    ComponentDescriptor::new(
        ComponentType::Effect,
        ComponentSubtype::Other(cadenza_core::FourCc::new(code)),
    )
}

/// Everything a session told its reporter, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Audible(Vec<usize>),
    GraphReady(cadenza_core::RenderParameters),
    Ready(f64),
    Progress(f64),
    Status(f64, Option<f32>),
    Overload(u64),
    Finished,
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<Event>,
}

impl Recorder {
    pub fn overload_total(&self) -> u64 {
        self.events
            .iter()
            .map(|e| match e {
                Event::Overload(n) => *n,
                _ => 0,
            })
            .sum()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl cadenza_core::Reporter for Recorder {
    fn audible_tracks(&mut self, indices: &[usize]) {
        self.events.push(Event::Audible(indices.to_vec()));
    }

    fn graph_ready(&mut self, params: &cadenza_core::RenderParameters) {
        self.events.push(Event::GraphReady(*params));
    }

    fn ready(&mut self, length: f64) {
        self.events.push(Event::Ready(length));
    }

    fn render_progress(&mut self, beats: f64, _length: f64) {
        self.events.push(Event::Progress(beats));
    }

    fn playback_status(&mut self, beats: f64, cpu_load: Option<f32>) {
        self.events.push(Event::Status(beats, cpu_load));
    }

    fn overload(&mut self, report: &cadenza_core::OverloadReport) {
        self.events.push(Event::Overload(report.count));
    }

    fn finished(&mut self) {
        self.events.push(Event::Finished);
    }
}

/// Pacer that counts waits and advances a shared frame clock.
#[derive(Debug)]
pub struct StepPacer {
    pub waits: u32,
    pub rendered: Rc<Cell<u64>>,
    pub frames_per_wait: u64,
}

impl StepPacer {
    pub fn new(rendered: Rc<Cell<u64>>, frames_per_wait: u64) -> Self {
        Self {
            waits: 0,
            rendered,
            frames_per_wait,
        }
    }
}

impl cadenza_core::Pacer for StepPacer {
    fn wait(&mut self, _interval: std::time::Duration) {
        self.waits += 1;
        self.rendered
            .set(self.rendered.get() + self.frames_per_wait);
    }
}
