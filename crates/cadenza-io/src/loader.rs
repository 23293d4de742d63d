//! Standard MIDI File loading via midly.
//!
//! Every file track becomes a score track except the conductor: the first
//! track of a format 1 file when it holds only meta events. Tempo changes
//! from any track go into the score's [`TempoMap`]. With
//! [`LoadOptions::channels_to_tracks`], channel events from every track are
//! regrouped into one track per MIDI channel.

use crate::score::{EventKind, NoteEvent, Score, Track};
use crate::tempo::TempoMap;
use crate::{Error, Result};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::path::Path;

/// How a file is turned into tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// One track per MIDI channel instead of one per file track.
    pub channels_to_tracks: bool,
}

/// Reads and parses the file at `path`.
pub fn load_file<P: AsRef<Path>>(path: P, options: LoadOptions) -> Result<Score> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let score = parse_smf(&bytes, options)?;
    tracing::info!(
        path = %path.display(),
        tracks = score.tracks().len(),
        length = score.length(),
        "loaded MIDI file"
    );
    Ok(score)
}

struct RawTrack {
    name: Option<String>,
    events: Vec<NoteEvent>,
    end: f64,
}

/// Parses SMF bytes into a [`Score`].
pub fn parse_smf(bytes: &[u8], options: LoadOptions) -> Result<Score> {
    let smf = Smf::parse(bytes)?;
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int(),
        Timing::Timecode(..) => {
            return Err(Error::UnsupportedFormat("SMPTE timecode timing".into()));
        }
    };
    if ticks_per_beat == 0 {
        return Err(Error::UnsupportedFormat("zero ticks per quarter note".into()));
    }
    let tpb = f64::from(ticks_per_beat);

    let mut tempo_changes = Vec::new();
    let mut raw = Vec::with_capacity(smf.tracks.len());
    for track in &smf.tracks {
        let mut tick = 0_u64;
        let mut name = None;
        let mut events = Vec::new();
        for event in track {
            tick += u64::from(event.delta.as_int());
            let beat = tick as f64 / tpb;
            match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    if let Some(kind) = event_kind(message) {
                        events.push(NoteEvent {
                            beat,
                            channel: channel.as_int(),
                            kind,
                        });
                    }
                }
                TrackEventKind::Meta(MetaMessage::Tempo(micros)) => {
                    tempo_changes.push((beat, micros.as_int()));
                }
                TrackEventKind::Meta(MetaMessage::TrackName(text)) if name.is_none() => {
                    name = Some(String::from_utf8_lossy(text).trim().to_string());
                }
                _ => {}
            }
        }
        raw.push(RawTrack {
            name: name.filter(|n| !n.is_empty()),
            events,
            end: tick as f64 / tpb,
        });
    }

    let conductor = smf.header.format == Format::Parallel
        && smf.tracks.first().is_some_and(|track| {
            track
                .iter()
                .all(|event| matches!(event.kind, TrackEventKind::Meta(_)))
        });

    let tracks = if options.channels_to_tracks {
        split_by_channel(raw)
    } else {
        raw.into_iter()
            .skip(usize::from(conductor))
            .map(|t| Track::new(t.name, t.events, t.end))
            .collect()
    };

    tracing::debug!(
        format = ?smf.header.format,
        conductor,
        ticks_per_beat,
        tempo_changes = tempo_changes.len(),
        "parsed SMF"
    );
    Ok(Score::new(
        tracks,
        TempoMap::from_changes(&tempo_changes),
        ticks_per_beat,
    ))
}

fn event_kind(message: MidiMessage) -> Option<EventKind> {
    match message {
        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => Some(EventKind::NoteOn {
            key: key.as_int(),
            velocity: vel.as_int(),
        }),
        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
            Some(EventKind::NoteOff { key: key.as_int() })
        }
        MidiMessage::ProgramChange { program } => Some(EventKind::ProgramChange {
            program: program.as_int(),
        }),
        _ => None,
    }
}

/// Each channel track ends where the latest source track feeding it ends.
fn split_by_channel(raw: Vec<RawTrack>) -> Vec<Track> {
    let mut channels: [(Vec<NoteEvent>, f64); 16] = Default::default();
    for track in raw {
        for event in track.events {
            let (events, end) = &mut channels[usize::from(event.channel & 0x0f)];
            events.push(event);
            *end = end.max(track.end);
        }
    }
    channels
        .into_iter()
        .enumerate()
        .filter(|(_, (events, _))| !events.is_empty())
        .map(|(channel, (events, end))| {
            Track::new(Some(format!("Channel {}", channel + 1)), events, end)
        })
        .collect()
}
