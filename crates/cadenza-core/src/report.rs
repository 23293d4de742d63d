//! Progress and diagnostic callbacks.
//!
//! The render loops and the session never print. They describe what happens
//! through a [`Reporter`], and the embedding application decides what to show.
//! Every method has an empty default, so a reporter implements only the
//! events it cares about.

use crate::configure::RenderParameters;
use crate::overload::OverloadReport;

/// Receives progress and diagnostics from a session.
pub trait Reporter {
    /// Indices of the tracks left audible by an explicit selection.
    fn audible_tracks(&mut self, _indices: &[usize]) {}

    /// The graph is configured and initialized with these parameters.
    fn graph_ready(&mut self, _params: &RenderParameters) {}

    /// Transport is prerolled; playback of `length` beats is about to start.
    fn ready(&mut self, _length: f64) {}

    /// Offline render progress, at a cadence of roughly ten seconds of audio.
    fn render_progress(&mut self, _beats: f64, _length: f64) {}

    /// Live playback position and graph CPU load, once per monitor tick.
    fn playback_status(&mut self, _beats: f64, _cpu_load: Option<f32>) {}

    /// Overloads since the previous report.
    fn overload(&mut self, _report: &OverloadReport) {}

    /// Playback or render finished and the transport stopped.
    fn finished(&mut self) {}
}

/// A reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Reporter for Silent {}
