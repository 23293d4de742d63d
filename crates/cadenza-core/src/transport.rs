//! The transport collaborator: start, stop and the playback clock.

use crate::status::Status;

/// Plays a sequence and reports its position in beats.
///
/// Owned and disposed by the caller; the core only drives it.
pub trait Transport {
    /// Moves the playback position to `beats`.
    fn set_time(&mut self, beats: f64) -> Result<(), Status>;

    /// Prepares the sequence for starting at the current position.
    fn preroll(&mut self) -> Result<(), Status>;

    /// Starts playback.
    fn start(&mut self) -> Result<(), Status>;

    /// Stops playback.
    fn stop(&mut self) -> Result<(), Status>;

    /// Current playback position in beats.
    fn current_time(&self) -> Result<f64, Status>;
}
