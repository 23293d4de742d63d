//! Polyphonic synthesizer that plays a [`Score`] against the playback clock.
//!
//! Every block, the synthesizer converts the clock position to a beat window,
//! collects the events of unmuted tracks that fall inside it, and renders its
//! voices up to each event's frame offset before applying it. A jump in the
//! clock (a transport relocation or a restart) re-seeks every track cursor
//! and releases sounding notes.
//!
//! Voices are simple oscillators with a linear attack and an exponential
//! release. The General MIDI program selects the waveform; channel 10 plays
//! short noise bursts.

use super::{Node, Property};
use crate::clock::PlaybackClock;
use crate::score::{EventKind, NoteEvent, Score};
use cadenza_core::{AudioBufferList, ComponentDescriptor, Status};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Voices available at a CPU load ceiling of 1.0.
pub const MAX_VOICES: usize = 32;

const ATTACK_SECONDS: f64 = 0.005;
const RELEASE_SECONDS: f64 = 0.15;
const PERCUSSION_RELEASE_SECONDS: f64 = 0.05;
const VOICE_GAIN: f32 = 0.15;
const SILENCE: f32 = 1e-4;
const DRUM_CHANNEL: u8 = 9;

/// Oscillator shape of a voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Waveform {
    /// Pure sine.
    #[default]
    Sine,
    /// Triangle.
    Triangle,
    /// Naive sawtooth.
    Saw,
    /// White noise.
    Noise,
}

impl Waveform {
    /// Waveform for a General MIDI program on `channel`.
    pub fn for_program(channel: u8, program: u8) -> Self {
        if channel == DRUM_CHANNEL {
            return Self::Noise;
        }
        match program {
            0..=7 | 24..=31 | 104..=111 => Self::Triangle,
            80..=95 => Self::Saw,
            _ => Self::Sine,
        }
    }

    fn sample(self, phase: f64, noise: &mut u32) -> f32 {
        match self {
            Self::Sine => (phase * std::f64::consts::TAU).sin() as f32,
            Self::Triangle => (1.0 - 4.0 * (phase - 0.5).abs()) as f32,
            Self::Saw => (2.0 * phase - 1.0) as f32,
            Self::Noise => {
                *noise = noise.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (*noise >> 8) as f32 / (1 << 23) as f32 - 1.0
            }
        }
    }
}

/// Convert a MIDI note number to frequency in Hz.
fn midi_to_freq(key: u8) -> f64 {
    440.0 * 2.0_f64.powf((f64::from(key) - 69.0) / 12.0)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Stage {
    #[default]
    Idle,
    Attack,
    Sustain,
    Release,
}

#[derive(Clone, Copy, Debug, Default)]
struct Voice {
    channel: u8,
    key: u8,
    waveform: Waveform,
    phase: f64,
    increment: f64,
    amplitude: f32,
    level: f32,
    stage: Stage,
    percussive: bool,
    started: u64,
}

impl Voice {
    fn is_active(&self) -> bool {
        self.stage != Stage::Idle
    }

    fn release(&mut self) {
        if self.is_active() {
            self.stage = Stage::Release;
        }
    }

    fn next(&mut self, envelope: &Envelope, noise: &mut u32) -> f32 {
        match self.stage {
            Stage::Idle => return 0.0,
            Stage::Attack => {
                self.level += envelope.attack_step;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = if self.percussive {
                        Stage::Release
                    } else {
                        Stage::Sustain
                    };
                }
            }
            Stage::Sustain => {}
            Stage::Release => {
                self.level *= if self.percussive {
                    envelope.percussion_coeff
                } else {
                    envelope.release_coeff
                };
                if self.level < SILENCE {
                    self.stage = Stage::Idle;
                    self.level = 0.0;
                    return 0.0;
                }
            }
        }
        let sample = self.waveform.sample(self.phase, noise);
        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        sample * self.level * self.amplitude
    }
}

#[derive(Clone, Copy, Debug)]
struct Envelope {
    attack_step: f32,
    release_coeff: f32,
    percussion_coeff: f32,
}

impl Envelope {
    fn new(sample_rate: f64) -> Self {
        let decay = |seconds: f64| (SILENCE.ln() as f64 / (seconds * sample_rate)).exp() as f32;
        Self {
            attack_step: (1.0 / (ATTACK_SECONDS * sample_rate)) as f32,
            release_coeff: decay(RELEASE_SECONDS),
            percussion_coeff: decay(PERCUSSION_RELEASE_SECONDS),
        }
    }
}

/// Score-driven polyphonic synthesizer node.
pub struct SynthNode {
    score: Arc<Score>,
    clock: PlaybackClock,
    sample_rate: f64,
    envelope: Envelope,
    voices: Vec<Voice>,
    programs: [u8; 16],
    cursors: Vec<usize>,
    pending: Vec<(usize, NoteEvent)>,
    last_beat: Option<f64>,
    was_running: bool,
    notes_started: u64,
    noise: u32,
    cpu_load_ceiling: f32,
    sound_bank: Option<PathBuf>,
    stream_from_disk: bool,
    offline_render: bool,
}

impl std::fmt::Debug for SynthNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthNode")
            .field("sample_rate", &self.sample_rate)
            .field("active_voices", &self.active_voices())
            .field("cpu_load_ceiling", &self.cpu_load_ceiling)
            .finish_non_exhaustive()
    }
}

impl SynthNode {
    /// Creates a synthesizer for `score`, following `clock`.
    pub fn new(score: Arc<Score>, clock: PlaybackClock, sample_rate: f64) -> Self {
        let tracks = score.tracks().len();
        Self {
            score,
            clock,
            sample_rate,
            envelope: Envelope::new(sample_rate),
            voices: vec![Voice::default(); MAX_VOICES],
            programs: [0; 16],
            cursors: vec![0; tracks],
            pending: Vec::with_capacity(256),
            last_beat: None,
            was_running: false,
            notes_started: 0,
            noise: 0x2545_f491,
            cpu_load_ceiling: 1.0,
            sound_bank: None,
            stream_from_disk: false,
            offline_render: false,
        }
    }

    /// Number of sounding voices.
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Voices allowed under the current CPU load ceiling.
    pub fn voice_limit(&self) -> usize {
        ((MAX_VOICES as f32 * self.cpu_load_ceiling).ceil() as usize).clamp(1, MAX_VOICES)
    }

    /// The CPU load ceiling.
    pub fn cpu_load_ceiling(&self) -> f32 {
        self.cpu_load_ceiling
    }

    /// The configured sound bank, if any.
    pub fn sound_bank(&self) -> Option<&Path> {
        self.sound_bank.as_deref()
    }

    /// Whether samples stream from disk.
    pub fn stream_from_disk(&self) -> bool {
        self.stream_from_disk
    }

    /// Whether the synthesizer is rendering offline.
    pub fn offline_render(&self) -> bool {
        self.offline_render
    }

    fn release_all(&mut self) {
        self.voices.iter_mut().for_each(Voice::release);
    }

    fn seek(&mut self, beat: f64) {
        for (cursor, track) in self.cursors.iter_mut().zip(self.score.tracks()) {
            *cursor = track.events().partition_point(|e| e.beat < beat);
        }
        self.release_all();
        tracing::trace!(beat, "synth seek");
    }

    fn collect_events(&mut self, start_seconds: f64, end_beat: f64, frames: usize) {
        self.pending.clear();
        let score = Arc::clone(&self.score);
        let tempo = score.tempo();
        for (track, cursor) in score.tracks().iter().zip(self.cursors.iter_mut()) {
            let muted = track.is_muted();
            let events = track.events();
            while let Some(event) = events.get(*cursor)
                && event.beat < end_beat
            {
                *cursor += 1;
                if muted && matches!(event.kind, EventKind::NoteOn { .. }) {
                    continue;
                }
                let offset = (tempo.beats_to_seconds(event.beat) - start_seconds) * self.sample_rate;
                let offset = (offset.max(0.0) as usize).min(frames.saturating_sub(1));
                self.pending.push((offset, *event));
            }
        }
        self.pending.sort_by_key(|(offset, _)| *offset);
    }

    fn apply(&mut self, event: NoteEvent) {
        let channel = event.channel & 0x0f;
        match event.kind {
            EventKind::NoteOn { key, velocity } => self.note_on(channel, key, velocity),
            EventKind::NoteOff { key } => {
                for voice in &mut self.voices {
                    if voice.channel == channel
                        && voice.key == key
                        && !voice.percussive
                        && voice.stage != Stage::Release
                    {
                        voice.release();
                    }
                }
            }
            EventKind::ProgramChange { program } => {
                self.programs[usize::from(channel)] = program;
            }
        }
    }

    fn note_on(&mut self, channel: u8, key: u8, velocity: u8) {
        let active = self.active_voices();
        let slot = if active < self.voice_limit() {
            self.voices.iter().position(|v| !v.is_active())
        } else {
            self.voices
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_active())
                .min_by_key(|(_, v)| v.started)
                .map(|(i, _)| i)
        };
        let Some(slot) = slot else {
            return;
        };

        self.notes_started += 1;
        let waveform = Waveform::for_program(channel, self.programs[usize::from(channel)]);
        self.voices[slot] = Voice {
            channel,
            key,
            waveform,
            phase: 0.0,
            increment: midi_to_freq(key) / self.sample_rate,
            amplitude: VOICE_GAIN * f32::from(velocity) / 127.0,
            level: 0.0,
            stage: Stage::Attack,
            percussive: channel == DRUM_CHANNEL,
            started: self.notes_started,
        };
    }

    fn render_voices(&mut self, output: &mut AudioBufferList, from: usize, to: usize) {
        if from >= to || !self.voices.iter().any(Voice::is_active) {
            return;
        }
        let envelope = self.envelope;
        for i in from..to {
            let mut sum = 0.0;
            for voice in &mut self.voices {
                sum += voice.next(&envelope, &mut self.noise);
            }
            for c in 0..output.channel_count() {
                output.channel_mut(c)[i] = sum;
            }
        }
    }
}

impl Node for SynthNode {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::SYNTH
    }

    fn set_sample_rate(&mut self, sample_rate: f64) -> Result<(), Status> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(Status::INVALID_PROPERTY_VALUE);
        }
        self.sample_rate = sample_rate;
        self.envelope = Envelope::new(sample_rate);
        Ok(())
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn set_property(&mut self, property: Property) -> Result<(), Status> {
        match property {
            Property::CpuLoadCeiling(ceiling) => {
                if ceiling.is_nan() || ceiling <= 0.0 || ceiling > 1.0 {
                    return Err(Status::INVALID_PROPERTY_VALUE);
                }
                self.cpu_load_ceiling = ceiling;
                tracing::debug!(ceiling, voices = self.voice_limit(), "synth voice limit");
            }
            Property::SoundBank(path) => {
                if !path.is_file() {
                    return Err(Status::FILE_NOT_FOUND);
                }
                tracing::debug!(bank = %path.display(), "synth sound bank");
                self.sound_bank = Some(path);
            }
            Property::StreamFromDisk(enabled) => self.stream_from_disk = enabled,
            Property::OfflineRender(enabled) => self.offline_render = enabled,
            Property::BufferFrameSize(_) => return Err(Status::INVALID_PROPERTY),
        }
        Ok(())
    }

    fn reset(&mut self) {
        for voice in &mut self.voices {
            *voice = Voice::default();
        }
        self.programs = [0; 16];
        self.last_beat = None;
        self.was_running = false;
    }

    fn process(
        &mut self,
        _input: Option<&AudioBufferList>,
        output: &mut AudioBufferList,
    ) -> Result<(), Status> {
        let frames = output.frames();
        if !self.clock.is_running() {
            if self.was_running {
                self.release_all();
                self.was_running = false;
            }
            self.render_voices(output, 0, frames);
            return Ok(());
        }

        let start = self.clock.seconds();
        let end = start + frames as f64 / self.sample_rate;
        let tempo = self.score.tempo();
        let start_beat = tempo.seconds_to_beats(start);
        let end_beat = tempo.seconds_to_beats(end);

        let continuous = self
            .last_beat
            .is_some_and(|last| (last - start_beat).abs() < 1e-6);
        if !self.was_running || !continuous {
            self.seek(start_beat);
        }
        self.was_running = true;

        self.collect_events(start, end_beat, frames);
        let mut position = 0;
        for index in 0..self.pending.len() {
            let (offset, event) = self.pending[index];
            self.render_voices(output, position, offset);
            position = position.max(offset);
            self.apply(event);
        }
        self.render_voices(output, position, frames);
        self.last_beat = Some(end_beat);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Track;
    use crate::tempo::TempoMap;

    fn score(tracks: Vec<Vec<NoteEvent>>) -> Arc<Score> {
        let tracks = tracks
            .into_iter()
            .map(|events| Track::new(None, events, 4.0))
            .collect();
        Arc::new(Score::new(tracks, TempoMap::default(), 480))
    }

    fn chord(keys: &[u8]) -> Vec<NoteEvent> {
        keys.iter()
            .map(|&key| NoteEvent {
                beat: 0.0,
                channel: 0,
                kind: EventKind::NoteOn { key, velocity: 100 },
            })
            .collect()
    }

    fn running_synth(score: Arc<Score>) -> (SynthNode, PlaybackClock) {
        let clock = PlaybackClock::new();
        clock.set_running(true);
        (SynthNode::new(score, clock.clone(), 48000.0), clock)
    }

    #[test]
    fn plays_notes_while_running() {
        let (mut synth, _clock) = running_synth(score(vec![chord(&[60])]));
        let mut output = AudioBufferList::stereo(512);
        synth.process(None, &mut output).unwrap();
        assert_eq!(synth.active_voices(), 1);
        assert!(output.peak() > 0.0);
        assert_eq!(output.channel(0), output.channel(1));
    }

    #[test]
    fn muted_tracks_start_no_notes() {
        let score = score(vec![chord(&[60, 64])]);
        score.tracks()[0].set_muted(true);
        let (mut synth, _clock) = running_synth(score);
        let mut output = AudioBufferList::stereo(512);
        synth.process(None, &mut output).unwrap();
        assert_eq!(synth.active_voices(), 0);
        assert_eq!(output.peak(), 0.0);
    }

    #[test]
    fn ceiling_limits_polyphony() {
        let (mut synth, _clock) = running_synth(score(vec![chord(&[60, 62, 64, 65, 67])]));
        synth
            .set_property(Property::CpuLoadCeiling(0.05))
            .unwrap();
        assert_eq!(synth.voice_limit(), 2);
        let mut output = AudioBufferList::stereo(64);
        synth.process(None, &mut output).unwrap();
        assert_eq!(synth.active_voices(), 2);
    }

    #[test]
    fn stopping_the_clock_releases_voices() {
        let (mut synth, clock) = running_synth(score(vec![chord(&[60])]));
        let mut output = AudioBufferList::stereo(512);
        synth.process(None, &mut output).unwrap();

        clock.set_running(false);
        for _ in 0..40 {
            output.prepare(512);
            synth.process(None, &mut output).unwrap();
        }
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn rejects_out_of_range_ceiling_and_missing_bank() {
        let (mut synth, _clock) = running_synth(score(vec![]));
        assert_eq!(
            synth.set_property(Property::CpuLoadCeiling(1.5)),
            Err(Status::INVALID_PROPERTY_VALUE)
        );
        assert_eq!(
            synth.set_property(Property::SoundBank("/no/such/bank.sf2".into())),
            Err(Status::FILE_NOT_FOUND)
        );
    }

    #[test]
    fn drum_channel_uses_noise() {
        assert_eq!(Waveform::for_program(9, 0), Waveform::Noise);
        assert_eq!(Waveform::for_program(0, 0), Waveform::Triangle);
        assert_eq!(Waveform::for_program(3, 81), Waveform::Saw);
    }
}
