//! End-to-end playback and render sessions.
//!
//! A [`Session`] borrows the sequence's graph for its whole lifetime and runs
//! the fixed setup order: open the graph, locate and configure the
//! synthesizer, configure the topology, initialize. It then plays live or
//! renders to a file against a caller-owned transport.

use crate::configure::{
    NodeHandle, RenderMode, RenderParameters, configure_graph, locate_synth,
};
use crate::graph::ProcessingGraph;
use crate::monitor::{LiveMonitor, MonitorOutcome, Pacer, ThreadSleep};
use crate::offline::{FileSink, OfflineRenderer, RenderSummary};
use crate::overload::OverloadMonitor;
use crate::report::Reporter;
use crate::status::{CheckStatus, Result};
use crate::tracks::{Sequence, TrackSelection, initialize_tracks, session_length};
use crate::transport::Transport;
use crate::unit::AudioUnit;
use std::path::PathBuf;
use std::sync::Arc;

/// Default synthesizer CPU load ceiling.
pub const DEFAULT_CPU_LOAD_CEILING: f32 = 0.8;

/// Properties applied to the synthesizer before the graph is configured.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthSettings {
    /// Fraction of the render budget the synthesizer may use.
    pub cpu_load_ceiling: f32,
    /// Sound bank to load, if any.
    pub sound_bank: Option<PathBuf>,
    /// Stream samples from disk instead of memory.
    pub stream_from_disk: bool,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            cpu_load_ceiling: DEFAULT_CPU_LOAD_CEILING,
            sound_bank: None,
            stream_from_disk: false,
        }
    }
}

/// Playback options shared by live and offline sessions.
#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    /// Position to start from, in beats.
    pub start_time: f64,
    /// Tracks to keep audible.
    pub selection: TrackSelection,
}

/// A configured graph ready to play.
pub struct Session<'g, G: ProcessingGraph> {
    graph: &'g mut G,
    params: RenderParameters,
    output: NodeHandle<G::Unit>,
    synth: NodeHandle<G::Unit>,
    overloads: Arc<OverloadMonitor>,
}

impl<'g, G: ProcessingGraph> Session<'g, G> {
    /// Opens and configures `graph` for `params.mode`, then initializes it.
    ///
    /// In live mode the device sample rate replaces `params.sample_rate`.
    pub fn prepare(
        graph: &'g mut G,
        mut params: RenderParameters,
        synth_settings: &SynthSettings,
        reporter: &mut dyn Reporter,
    ) -> Result<Self> {
        graph.open().check("GraphOpen")?;
        let mut synth = locate_synth(graph)?;
        apply_synth_settings(&mut synth.unit, synth_settings, params.mode)?;

        let overloads = Arc::new(OverloadMonitor::new());
        let output = configure_graph(graph, &mut params, &overloads)?;
        graph.initialize().check("GraphInitialize")?;
        reporter.graph_ready(&params);

        Ok(Self {
            graph,
            params,
            output,
            synth,
            overloads,
        })
    }

    /// Render parameters after configuration.
    pub fn params(&self) -> &RenderParameters {
        &self.params
    }

    /// The active output node.
    pub fn output(&self) -> &NodeHandle<G::Unit> {
        &self.output
    }

    /// The synthesizer node.
    pub fn synth(&self) -> &NodeHandle<G::Unit> {
        &self.synth
    }

    /// The session's overload signal.
    pub fn overloads(&self) -> &Arc<OverloadMonitor> {
        &self.overloads
    }

    /// The borrowed graph.
    pub fn graph(&self) -> &G {
        &*self.graph
    }

    /// Plays through the device until the end or until `monitor` cancels.
    pub fn play<S, T>(
        &mut self,
        sequence: &mut S,
        transport: &mut T,
        options: &PlayOptions,
        monitor: &LiveMonitor,
        reporter: &mut dyn Reporter,
    ) -> Result<MonitorOutcome>
    where
        S: Sequence + ?Sized,
        T: Transport + ?Sized,
    {
        self.play_with(&mut ThreadSleep, sequence, transport, options, monitor, reporter)
    }

    /// [`play`](Self::play) with a custom pacer for the monitor loop.
    pub fn play_with<P, S, T>(
        &mut self,
        pacer: &mut P,
        sequence: &mut S,
        transport: &mut T,
        options: &PlayOptions,
        monitor: &LiveMonitor,
        reporter: &mut dyn Reporter,
    ) -> Result<MonitorOutcome>
    where
        P: Pacer + ?Sized,
        S: Sequence + ?Sized,
        T: Transport + ?Sized,
    {
        let length = self.start(sequence, transport, options, reporter)?;
        let outcome = monitor.monitor_with(
            pacer,
            transport,
            Some(&*self.graph),
            length,
            &self.overloads,
            reporter,
        )?;
        self.stop(transport, reporter)?;
        Ok(outcome)
    }

    /// Renders the sequence into `sink` faster than real time.
    pub fn render<S, T, F>(
        &mut self,
        sequence: &mut S,
        transport: &mut T,
        sink: &mut F,
        options: &PlayOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<RenderSummary>
    where
        S: Sequence + ?Sized,
        T: Transport + ?Sized,
        F: FileSink + ?Sized,
    {
        let length = self.start(sequence, transport, options, reporter)?;
        let renderer = OfflineRenderer::new(&self.params);
        let summary = renderer.render(&mut self.output.unit, sink, transport, length, reporter)?;
        self.stop(transport, reporter)?;
        sink.finish().check("FileDispose")?;
        Ok(summary)
    }

    fn start<S, T>(
        &mut self,
        sequence: &mut S,
        transport: &mut T,
        options: &PlayOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<f64>
    where
        S: Sequence + ?Sized,
        T: Transport + ?Sized,
    {
        let length = session_length(initialize_tracks(sequence, &options.selection, reporter)?);

        transport
            .set_time(options.start_time)
            .check("PlayerSetTime")?;
        transport.preroll().check("PlayerPreroll")?;
        reporter.ready(length);

        self.overloads.mark_started();
        transport.start().check("PlayerStart")?;
        tracing::info!(length, start = options.start_time, "transport started");
        Ok(length)
    }

    fn stop<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        transport.stop().check("PlayerStop")?;
        tracing::info!("transport stopped");
        reporter.finished();
        Ok(())
    }
}

fn apply_synth_settings<U: AudioUnit>(
    unit: &mut U,
    settings: &SynthSettings,
    mode: RenderMode,
) -> Result<()> {
    unit.set_cpu_load_ceiling(settings.cpu_load_ceiling)
        .check("SetProperty: CPULoad")?;
    if let Some(bank) = &settings.sound_bank {
        tracing::info!(bank = %bank.display(), "setting sound bank");
        unit.set_sound_bank(bank).check("SetProperty: SoundBankURL")?;
    }
    if settings.stream_from_disk {
        unit.set_stream_from_disk(true)
            .check("SetProperty: StreamFromDisk")?;
    }
    if mode == RenderMode::Offline {
        unit.set_offline_render(true)
            .check("SetProperty: OfflineRender")?;
    }
    Ok(())
}
