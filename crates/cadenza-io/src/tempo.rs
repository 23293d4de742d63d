//! Beat/seconds conversion across tempo changes.

/// Tempo of a sequence without tempo events: 120 BPM.
pub const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    beat: f64,
    seconds: f64,
    seconds_per_beat: f64,
}

/// Piecewise-constant tempo map.
///
/// Each segment starts at a beat position and holds its tempo until the next
/// change. Positions before the first change use the first segment's tempo.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    segments: Vec<Segment>,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::from_changes(&[])
    }
}

impl TempoMap {
    /// A single tempo for the whole sequence.
    pub fn constant(bpm: f64) -> Self {
        Self {
            segments: vec![Segment {
                beat: 0.0,
                seconds: 0.0,
                seconds_per_beat: 60.0 / bpm,
            }],
        }
    }

    /// Builds a map from `(beat, microseconds per quarter note)` changes.
    ///
    /// Changes may arrive in any order. When none applies at beat 0 the
    /// sequence starts at 120 BPM; later changes at the same beat win.
    pub fn from_changes(changes: &[(f64, u32)]) -> Self {
        let mut sorted: Vec<(f64, u32)> = changes
            .iter()
            .copied()
            .filter(|(beat, micros)| beat.is_finite() && *beat >= 0.0 && *micros > 0)
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut segments = vec![Segment {
            beat: 0.0,
            seconds: 0.0,
            seconds_per_beat: f64::from(DEFAULT_MICROS_PER_QUARTER) / 1e6,
        }];
        for (beat, micros) in sorted {
            let seconds_per_beat = f64::from(micros) / 1e6;
            let Some(last) = segments.last_mut() else {
                continue;
            };
            if beat == last.beat {
                last.seconds_per_beat = seconds_per_beat;
                continue;
            }
            let seconds = last.seconds + (beat - last.beat) * last.seconds_per_beat;
            segments.push(Segment {
                beat,
                seconds,
                seconds_per_beat,
            });
        }
        Self { segments }
    }

    /// Number of tempo segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` if the map has no segments. Never true for a built map.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn segment_at_beat(&self, beats: f64) -> &Segment {
        let index = self.segments.partition_point(|s| s.beat <= beats);
        &self.segments[index.saturating_sub(1)]
    }

    fn segment_at_seconds(&self, seconds: f64) -> &Segment {
        let index = self.segments.partition_point(|s| s.seconds <= seconds);
        &self.segments[index.saturating_sub(1)]
    }

    /// Wall-clock position of `beats`.
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        let segment = self.segment_at_beat(beats);
        segment.seconds + (beats - segment.beat) * segment.seconds_per_beat
    }

    /// Beat position at `seconds`.
    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        let segment = self.segment_at_seconds(seconds);
        segment.beat + (seconds - segment.seconds) / segment.seconds_per_beat
    }

    /// Tempo in effect at `beats`, in beats per minute.
    pub fn bpm_at(&self, beats: f64) -> f64 {
        60.0 / self.segment_at_beat(beats).seconds_per_beat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_120_bpm() {
        let map = TempoMap::default();
        assert_eq!(map.bpm_at(0.0), 120.0);
        assert_eq!(map.beats_to_seconds(20.0), 10.0);
        assert_eq!(map.seconds_to_beats(10.0), 20.0);
    }

    #[test]
    fn tempo_change_bends_the_timeline() {
        // 120 BPM for 4 beats (2 s), then 60 BPM.
        let map = TempoMap::from_changes(&[(4.0, 1_000_000)]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.beats_to_seconds(4.0), 2.0);
        assert_eq!(map.beats_to_seconds(6.0), 4.0);
        assert_eq!(map.seconds_to_beats(4.0), 6.0);
        assert_eq!(map.bpm_at(5.0), 60.0);
    }

    #[test]
    fn change_at_zero_replaces_default() {
        let map = TempoMap::from_changes(&[(0.0, 400_000)]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.bpm_at(0.0), 150.0);
    }

    #[test]
    fn conversion_round_trips_across_segments() {
        let map = TempoMap::from_changes(&[(8.0, 600_000), (2.0, 300_000), (16.0, 450_000)]);
        for beats in [0.0, 1.5, 2.0, 7.9, 8.0, 12.25, 40.0] {
            let back = map.seconds_to_beats(map.beats_to_seconds(beats));
            assert!((back - beats).abs() < 1e-9, "{beats} -> {back}");
        }
    }
}
