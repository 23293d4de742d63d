//! Software processing graph, MIDI sequences and audio I/O for cadenza.
//!
//! This crate provides the concrete collaborators that `cadenza-core` drives:
//!
//! - **Sequences**: [`MidiSequence`] loads a Standard MIDI File and owns the
//!   graph that plays it (synthesizer → peak limiter → device output)
//! - **Graph**: [`SoftwareGraph`] and [`SoftwareUnit`], an in-process
//!   processing graph that pulls audio from node to node
//! - **Transport**: [`SequencePlayer`], which drives the sequence clock and the
//!   device stream
//! - **Devices**: [`CpalDevice`] for real hardware and [`ManualDevice`] for
//!   callers that pump the render callback themselves
//! - **Files**: [`WavFileSink`] writes rendered blocks to WAV via hound
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cadenza_core::{PlayOptions, RenderParameters, Session, Silent, SynthSettings};
//! use cadenza_io::{LoadOptions, ManualDevice, MidiSequence, WavFileSink};
//!
//! let device = ManualDevice::new(44100, 2);
//! let mut sequence = MidiSequence::load("song.mid", LoadOptions::default(), Box::new(device))?;
//! let mut player = sequence.player();
//! let mut graph = sequence.graph().clone();
//!
//! let params = RenderParameters::offline(44100.0, 512);
//! let mut session = Session::prepare(&mut graph, params, &SynthSettings::default(), &mut Silent)?;
//! let mut sink = WavFileSink::create("song.wav", 44100, 2, 16)?;
//! session.render(&mut sequence, &mut player, &mut sink, &PlayOptions::default(), &mut Silent)?;
//! ```

mod clock;
mod device;
mod graph;
mod loader;
pub mod nodes;
mod player;
mod score;
mod sequence;
mod sink;
mod tempo;
mod unit;

pub use clock::PlaybackClock;
pub use device::{
    CpalDevice, DeviceInfo, ManualDevice, OutputDevice, RenderCallback, StreamHandle,
    list_output_devices,
};
pub use graph::SoftwareGraph;
pub use loader::{LoadOptions, load_file, parse_smf};
pub use player::SequencePlayer;
pub use score::{EventKind, NoteEvent, Score, Track};
pub use sequence::MidiSequence;
pub use sink::{FileFormat, SampleEncoding, WavFileSink};
pub use tempo::TempoMap;
pub use unit::SoftwareUnit;

use cadenza_core::Status;

/// Error types for cadenza I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// MIDI file parse error.
    #[error("MIDI file error: {0}")]
    Midi(#[from] midly::Error),

    /// WAV file write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The output path names a container this crate cannot write.
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// The file or sample format is not supported.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The status code reported to the orchestration layer for this error.
    pub fn status(&self) -> Status {
        match self {
            Self::Midi(_) | Self::UnsupportedFormat(_) => Status::UNSUPPORTED_DATA_FORMAT,
            Self::Wav(_) => Status::WRITE_FAILED,
            Self::Stream(_) => Status::DEVICE_ERROR,
            Self::NoDevice | Self::DeviceNotFound(_) => Status::COMPONENT_NOT_FOUND,
            Self::UnsupportedFileType(_) => Status::UNSUPPORTED_FILE_TYPE,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => Status::FILE_NOT_FOUND,
            Self::Io(_) => Status::WRITE_FAILED,
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        err.status()
    }
}

/// Convenience result type for cadenza I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
