//! A loaded MIDI sequence and the graph it plays through.

use crate::clock::PlaybackClock;
use crate::device::OutputDevice;
use crate::graph::SoftwareGraph;
use crate::loader::{LoadOptions, load_file};
use crate::player::SequencePlayer;
use crate::score::Score;
use crate::Result;
use cadenza_core::{Sequence, Status};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A score bound to its processing graph and playback clock.
///
/// Creating a sequence creates its graph: synthesizer → peak limiter →
/// device output. The graph is shared; [`graph`](Self::graph) returns a
/// handle the session can configure while the sequence keeps its own.
#[derive(Debug, Clone)]
pub struct MidiSequence {
    score: Arc<Score>,
    clock: PlaybackClock,
    graph: SoftwareGraph,
}

impl MidiSequence {
    /// Loads the Standard MIDI File at `path`.
    pub fn load<P: AsRef<Path>>(
        path: P,
        options: LoadOptions,
        device: Box<dyn OutputDevice>,
    ) -> Result<Self> {
        let score = load_file(path, options)?;
        Ok(Self::from_score(score, device))
    }

    /// Wraps an already built score.
    pub fn from_score(score: Score, device: Box<dyn OutputDevice>) -> Self {
        let score = Arc::new(score);
        let clock = PlaybackClock::new();
        let graph = SoftwareGraph::with_default_chain(Arc::clone(&score), clock.clone(), device);
        Self {
            score,
            clock,
            graph,
        }
    }

    /// The score.
    pub fn score(&self) -> &Score {
        &self.score
    }

    /// The sequence's graph.
    pub fn graph(&self) -> &SoftwareGraph {
        &self.graph
    }

    /// A transport for this sequence.
    pub fn player(&self) -> SequencePlayer {
        SequencePlayer::new(
            Arc::clone(&self.score),
            self.clock.clone(),
            self.graph.clone(),
        )
    }

    /// Length of the longest track in beats.
    pub fn length(&self) -> f64 {
        self.score.length()
    }
}

impl Sequence for MidiSequence {
    fn track_count(&self) -> std::result::Result<usize, Status> {
        Ok(self.score.tracks().len())
    }

    fn track_length(&self, index: usize) -> std::result::Result<f64, Status> {
        self.score
            .track(index)
            .map(|t| t.length())
            .ok_or(Status::PARAM)
    }

    fn set_track_muted(&mut self, index: usize, muted: bool) -> std::result::Result<(), Status> {
        self.score
            .track(index)
            .ok_or(Status::PARAM)?
            .set_muted(muted);
        Ok(())
    }
}

impl fmt::Display for MidiSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tempo = self.score.tempo();
        writeln!(
            f,
            "Sequence: {} tracks, {:.2} beats, {} ticks/beat, {:.1} BPM{}",
            self.score.tracks().len(),
            self.score.length(),
            self.score.ticks_per_beat(),
            tempo.bpm_at(0.0),
            if tempo.len() > 1 {
                format!(" ({} tempo changes)", tempo.len() - 1)
            } else {
                String::new()
            }
        )?;
        for (index, track) in self.score.tracks().iter().enumerate() {
            write!(
                f,
                "  Track {}: {} notes, {:.2} beats",
                index + 1,
                track.note_count(),
                track.length()
            )?;
            if let Some(name) = track.name() {
                write!(f, " \"{name}\"")?;
            }
            if track.is_muted() {
                write!(f, " (muted)")?;
            }
            writeln!(f)?;
        }
        write!(f, "{}", self.graph)
    }
}
