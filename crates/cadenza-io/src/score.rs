//! In-memory score: tracks of timed note events plus a tempo map.

use crate::tempo::TempoMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// What a note event does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Start a note.
    NoteOn {
        /// MIDI key, 0..=127.
        key: u8,
        /// Velocity, 1..=127.
        velocity: u8,
    },
    /// Release a note.
    NoteOff {
        /// MIDI key, 0..=127.
        key: u8,
    },
    /// Select the channel's instrument.
    ProgramChange {
        /// General MIDI program number, 0..=127.
        program: u8,
    },
}

/// An event at a beat position on a MIDI channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    /// Position in beats.
    pub beat: f64,
    /// MIDI channel, 0..=15.
    pub channel: u8,
    /// The event.
    pub kind: EventKind,
}

/// One track of a score.
///
/// The mute flag is atomic: the control thread writes it while the render
/// thread reads it.
#[derive(Debug)]
pub struct Track {
    name: Option<String>,
    events: Vec<NoteEvent>,
    length: f64,
    muted: AtomicBool,
}

impl Track {
    /// Creates a track. Events are sorted by beat, keeping their relative
    /// order at equal positions; the length is never shorter than the last
    /// event.
    pub fn new(name: Option<String>, mut events: Vec<NoteEvent>, length: f64) -> Self {
        events.sort_by(|a, b| a.beat.total_cmp(&b.beat));
        let last = events.last().map_or(0.0, |e| e.beat);
        Self {
            name,
            events,
            length: length.max(last),
            muted: AtomicBool::new(false),
        }
    }

    /// Track name from the file, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Events ordered by beat.
    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    /// Length in beats.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Number of note-on events.
    pub fn note_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::NoteOn { .. }))
            .count()
    }

    /// Returns `true` if the track is muted.
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    /// Sets the mute flag.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
    }
}

/// A loaded sequence: tracks, tempo, and source resolution.
#[derive(Debug, Default)]
pub struct Score {
    tracks: Vec<Track>,
    tempo: TempoMap,
    ticks_per_beat: u16,
}

impl Score {
    /// Creates a score.
    pub fn new(tracks: Vec<Track>, tempo: TempoMap, ticks_per_beat: u16) -> Self {
        Self {
            tracks,
            tempo,
            ticks_per_beat,
        }
    }

    /// All tracks.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Track `index`, if it exists.
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// The tempo map.
    pub fn tempo(&self) -> &TempoMap {
        &self.tempo
    }

    /// Resolution of the source file, in ticks per quarter note.
    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    /// Length of the longest track in beats.
    pub fn length(&self) -> f64 {
        self.tracks.iter().map(Track::length).fold(0.0, f64::max)
    }
}
