//! Tempo segments and the piecewise time → scroll position map.

use anyhow::{Result, bail, ensure};
use serde::{Deserialize, Serialize};

/// Beats in one measure.
pub const BEATS_PER_MEASURE: f64 = 4.0;

/// Milliseconds per minute.
pub const MS_PER_MINUTE: f64 = 60_000.0;

/// A tempo change: from `start_time` onward the chart runs at `bpm`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoSegment {
    /// Start time in milliseconds.
    pub start_time: f64,
    /// Beats per minute.
    pub bpm: f64,
}

impl TempoSegment {
    pub fn new(start_time: f64, bpm: f64) -> Self {
        Self { start_time, bpm }
    }

    /// Length of one beat in milliseconds.
    pub fn beat_length_ms(&self) -> f64 {
        MS_PER_MINUTE / self.bpm
    }

    /// Length of one measure (4 beats) in milliseconds.
    pub fn measure_length_ms(&self) -> f64 {
        BEATS_PER_MEASURE * MS_PER_MINUTE / self.bpm
    }
}

/// Validated, time-ordered tempo segments with precomputed scroll offsets.
///
/// Position advances one unit per millisecond at the first segment's tempo;
/// every other segment scrolls proportionally to its BPM. The last segment
/// extends to the end of the chart, the first one extends backwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    segments: Vec<TempoSegment>,
    /// Scroll position at each segment's start.
    positions: Vec<f64>,
    /// Measure length of the reference (first) segment.
    reference_measure_ms: f64,
}

impl TempoMap {
    /// Build a tempo map, rejecting empty, non-positive or unordered segments.
    pub fn new(segments: Vec<TempoSegment>) -> Result<Self> {
        ensure!(!segments.is_empty(), "chart has no tempo segments");

        for (i, seg) in segments.iter().enumerate() {
            if !seg.start_time.is_finite() {
                bail!("tempo segment {i} has non-finite start time");
            }
            if !seg.bpm.is_finite() || seg.bpm <= 0.0 {
                bail!("tempo segment {i} has invalid bpm {}", seg.bpm);
            }
            if i > 0 && seg.start_time <= segments[i - 1].start_time {
                bail!(
                    "tempo segment {i} starts at {} which is not after {}",
                    seg.start_time,
                    segments[i - 1].start_time
                );
            }
        }

        let reference_measure_ms = segments[0].measure_length_ms();
        let mut positions = Vec::with_capacity(segments.len());
        positions.push(segments[0].start_time);
        for pair in segments.windows(2) {
            let prev = positions[positions.len() - 1];
            let measures = (pair[1].start_time - pair[0].start_time) / pair[0].measure_length_ms();
            positions.push(prev + measures * reference_measure_ms);
        }

        Ok(Self {
            segments,
            positions,
            reference_measure_ms,
        })
    }

    pub fn segments(&self) -> &[TempoSegment] {
        &self.segments
    }

    /// Index of the segment containing `time`.
    ///
    /// Times before the first segment map to the first segment.
    pub fn segment_index_at(&self, time: f64) -> usize {
        self.segments
            .partition_point(|s| s.start_time <= time)
            .saturating_sub(1)
    }

    pub fn segment_at(&self, time: f64) -> &TempoSegment {
        &self.segments[self.segment_index_at(time)]
    }

    pub fn bpm_at(&self, time: f64) -> f64 {
        self.segment_at(time).bpm
    }

    /// Map a song time (ms) to a scroll position.
    ///
    /// Monotonic non-decreasing and continuous at every segment boundary.
    pub fn time_to_position(&self, time: f64) -> f64 {
        let index = self.segment_index_at(time);
        let seg = &self.segments[index];
        let measures = (time - seg.start_time) / seg.measure_length_ms();
        self.positions[index] + measures * self.reference_measure_ms
    }
}
