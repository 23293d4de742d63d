//! Graph configuration and render loops for sequence playback.
//!
//! This crate drives an audio processing graph from a musical sequence. It
//! owns no signal processing: the graph, its units, the transport and the
//! file sink are collaborators behind traits, and the crate only orchestrates
//! topology, parameters and timing.
//!
//! - **Graph configuration**: [`configure_graph`] rewires a graph for live
//!   device output or offline rendering and propagates the sample rate and
//!   block size to every node; [`locate_synth`] finds the synthesizer.
//! - **Tracks**: [`initialize_tracks`] applies a [`TrackSelection`] and
//!   computes the longest track.
//! - **Rendering**: [`OfflineRenderer`] pulls fixed-size blocks into a
//!   [`FileSink`]; [`LiveMonitor`] polls a playing transport and reports
//!   overloads signalled through an [`OverloadMonitor`].
//! - **Sessions**: [`Session`] runs the whole setup and playback sequence.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cadenza_core::{PlayOptions, RenderParameters, Session, Silent, SynthSettings};
//!
//! let params = RenderParameters::offline(44100.0, 512);
//! let mut session = Session::prepare(&mut graph, params, &SynthSettings::default(), &mut Silent)?;
//! let summary = session.render(&mut sequence, &mut player, &mut sink, &PlayOptions::default(), &mut Silent)?;
//! ```

pub mod buffer;
pub mod component;
pub mod configure;
pub mod graph;
pub mod monitor;
pub mod offline;
pub mod overload;
pub mod report;
pub mod session;
pub mod status;
pub mod tracks;
pub mod transport;
pub mod unit;

pub use buffer::{AudioBufferList, AudioTimeStamp, TimeStampFlags};
pub use component::{ComponentDescriptor, ComponentSubtype, ComponentType, NodeId};
pub use configure::{
    DEFAULT_FRAMES_PER_BLOCK, NodeHandle, RenderMode, RenderParameters, configure_graph,
    find_output, locate_synth,
};
pub use graph::ProcessingGraph;
pub use monitor::{
    DEFAULT_CANCEL_TICKS, DEFAULT_INTERVAL, LiveMonitor, MonitorOutcome, Pacer, ThreadSleep,
};
pub use offline::{FileSink, OfflineRenderer, PROGRESS_INTERVAL_SECONDS, RenderSummary};
pub use overload::{OverloadMonitor, OverloadReport};
pub use report::{Reporter, Silent};
pub use session::{DEFAULT_CPU_LOAD_CEILING, PlayOptions, Session, SynthSettings};
pub use status::{CheckStatus, Error, FourCc, Result, Status};
pub use tracks::{Sequence, TAIL_BEATS, TrackSelection, initialize_tracks, session_length};
pub use transport::Transport;
pub use unit::AudioUnit;
