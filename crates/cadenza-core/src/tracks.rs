//! Sequence tracks: total length and selection muting.

use crate::report::Reporter;
use crate::status::{CheckStatus, Result, Status};
use std::collections::BTreeSet;

/// Beats appended after the longest track so reverb and releases can ring out.
pub const TAIL_BEATS: f64 = 8.0;

/// A time-ordered set of tracks, addressed by 0-based index.
pub trait Sequence {
    /// Number of tracks.
    fn track_count(&self) -> std::result::Result<usize, Status>;

    /// Length of track `index` in beats.
    fn track_length(&self, index: usize) -> std::result::Result<f64, Status>;

    /// Sets the mute flag of track `index`.
    fn set_track_muted(&mut self, index: usize, muted: bool) -> std::result::Result<(), Status>;
}

/// Track indices the caller wants audible. Empty means every track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSelection(BTreeSet<usize>);

impl TrackSelection {
    /// Every track audible.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only the given 0-based indices audible.
    pub fn only<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        Self(indices.into_iter().collect())
    }

    /// Returns `true` if no explicit selection was made.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if track `index` should be heard.
    pub fn is_audible(&self, index: usize) -> bool {
        self.0.is_empty() || self.0.contains(&index)
    }
}

impl FromIterator<usize> for TrackSelection {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self::only(iter)
    }
}

/// Applies `selection` to every track and returns the longest track length.
///
/// Each track is muted unless the selection is empty or contains its index;
/// mute flags are written before the length is returned, so the caller never
/// observes a length computed against stale mute state. When a selection is
/// active, the audible indices are passed to `reporter`.
///
/// The caller adds [`TAIL_BEATS`] to obtain the session length.
pub fn initialize_tracks<S: Sequence + ?Sized>(
    sequence: &mut S,
    selection: &TrackSelection,
    reporter: &mut dyn Reporter,
) -> Result<f64> {
    let count = sequence.track_count().check("SequenceGetTrackCount")?;
    let mut longest = 0.0_f64;
    let mut audible = Vec::new();

    for index in 0..count {
        let length = sequence
            .track_length(index)
            .check("TrackGetProperty: TrackLength")?;
        longest = longest.max(length);

        let heard = selection.is_audible(index);
        sequence
            .set_track_muted(index, !heard)
            .check("TrackSetProperty: MuteStatus")?;
        if heard {
            audible.push(index);
        }
    }

    if !selection.is_empty() {
        reporter.audible_tracks(&audible);
    }
    tracing::debug!(tracks = count, audible = audible.len(), longest, "tracks initialized");
    Ok(longest)
}

/// Session length for a sequence whose longest track is `longest` beats.
pub fn session_length(longest: f64) -> f64 {
    longest + TAIL_BEATS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selection_hears_everything() {
        let selection = TrackSelection::all();
        assert!((0..10).all(|i| selection.is_audible(i)));
    }

    #[test]
    fn explicit_selection_hears_members_only() {
        let selection: TrackSelection = [1, 3].into_iter().collect();
        assert!(!selection.is_audible(0));
        assert!(selection.is_audible(1));
        assert!(!selection.is_audible(2));
        assert!(selection.is_audible(3));
    }

    #[test]
    fn session_length_adds_tail() {
        assert_eq!(session_length(12.0), 20.0);
    }
}
