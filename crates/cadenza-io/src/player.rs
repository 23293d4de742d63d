//! Transport for a [`MidiSequence`](crate::MidiSequence).

use crate::clock::PlaybackClock;
use crate::graph::SoftwareGraph;
use crate::score::Score;
use cadenza_core::{Status, Transport};
use std::sync::Arc;

/// Plays a sequence by running its clock and, live, its device stream.
///
/// The position moves only while blocks are rendered: by the device thread
/// in live mode, by the caller's pull loop offline.
#[derive(Debug, Clone)]
pub struct SequencePlayer {
    score: Arc<Score>,
    clock: PlaybackClock,
    graph: SoftwareGraph,
    prerolled: bool,
}

impl SequencePlayer {
    pub(crate) fn new(score: Arc<Score>, clock: PlaybackClock, graph: SoftwareGraph) -> Self {
        Self {
            score,
            clock,
            graph,
            prerolled: false,
        }
    }

    /// Returns `true` while started.
    pub fn is_playing(&self) -> bool {
        self.clock.is_running()
    }

    /// Returns `true` once [`preroll`](Transport::preroll) ran.
    pub fn is_prerolled(&self) -> bool {
        self.prerolled
    }
}

impl Transport for SequencePlayer {
    fn set_time(&mut self, beats: f64) -> Result<(), Status> {
        if !beats.is_finite() || beats < 0.0 {
            return Err(Status::PARAM);
        }
        let seconds = self.score.tempo().beats_to_seconds(beats);
        self.clock.set_seconds(seconds);
        tracing::debug!(beats, seconds, "player located");
        Ok(())
    }

    fn preroll(&mut self) -> Result<(), Status> {
        if !self.graph.is_initialized() {
            return Err(Status::UNINITIALIZED);
        }
        self.prerolled = true;
        Ok(())
    }

    fn start(&mut self) -> Result<(), Status> {
        if !self.graph.is_initialized() {
            return Err(Status::UNINITIALIZED);
        }
        self.clock.set_running(true);
        if let Err(err) = self.graph.start_device() {
            self.clock.set_running(false);
            tracing::error!(error = %err, "failed to start device stream");
            return Err(err.status());
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Status> {
        self.graph.stop_device();
        self.clock.set_running(false);
        self.prerolled = false;
        Ok(())
    }

    fn current_time(&self) -> Result<f64, Status> {
        Ok(self.score.tempo().seconds_to_beats(self.clock.seconds()))
    }
}
