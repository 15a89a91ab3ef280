use anyhow::{Result, bail, ensure};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{MAX_KEY_COUNT, MAX_TIMING_LINES};
use crate::hit_object::HitObjectInfo;
use crate::tempo::{TempoMap, TempoSegment};

/// Tolerance when deciding that the running measure position reached the
/// next tempo segment.
const SEGMENT_SWITCH_TOLERANCE_MS: f64 = 1.0;

/// Externally parsed chart data. Input to [`ChartTimeline::new`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartData {
    /// Number of lanes (keys).
    pub key_count: usize,
    /// Chart length in milliseconds. Derived from the last object when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    /// Tempo changes, ordered by start time.
    pub tempo: Vec<TempoSegment>,
    /// Hit objects in any order.
    pub hit_objects: Vec<HitObjectInfo>,
}

/// A measure line on the scrolling track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingLineMarker {
    /// Song time in milliseconds.
    pub time: f64,
    /// Scroll position derived from the tempo map.
    pub position: f64,
}

/// Immutable, time-ordered chart built once at load time.
#[derive(Debug, Clone)]
pub struct ChartTimeline {
    key_count: usize,
    length: f64,
    tempo: TempoMap,
    hit_objects: Vec<HitObjectInfo>,
    timing_lines: Vec<TimingLineMarker>,
}

impl ChartTimeline {
    /// Validate chart data and derive the timeline.
    ///
    /// Hit objects are sorted by start time; ties keep their input order.
    pub fn new(data: ChartData) -> Result<Self> {
        let ChartData {
            key_count,
            length,
            tempo,
            mut hit_objects,
        } = data;

        ensure!(key_count > 0, "chart has no lanes");
        ensure!(
            key_count <= MAX_KEY_COUNT,
            "chart has {key_count} lanes, at most {MAX_KEY_COUNT} are supported"
        );
        let tempo = TempoMap::new(tempo)?;

        for (i, obj) in hit_objects.iter().enumerate() {
            if obj.lane == 0 || obj.lane > key_count {
                bail!(
                    "hit object {i} is in lane {} but the chart has {key_count} lanes",
                    obj.lane
                );
            }
            if !obj.start_time.is_finite() {
                bail!("hit object {i} has non-finite start time");
            }
            if let Some(end) = obj.end_time
                && (!end.is_finite() || end <= obj.start_time)
            {
                bail!(
                    "hold {i} ends at {end} which is not after its start {}",
                    obj.start_time
                );
            }
        }

        hit_objects.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        let length = match length {
            Some(len) => {
                ensure!(len.is_finite(), "chart length is not finite");
                len
            }
            None => hit_objects
                .iter()
                .map(HitObjectInfo::last_time)
                .fold(tempo.segments()[0].start_time, f64::max),
        };

        let timing_lines = generate_timing_lines(&tempo, length)?;

        debug!(
            "timeline built: {} objects, {} tempo segments, {} timing lines",
            hit_objects.len(),
            tempo.segments().len(),
            timing_lines.len()
        );

        Ok(Self {
            key_count,
            length,
            tempo,
            hit_objects,
            timing_lines,
        })
    }

    pub fn key_count(&self) -> usize {
        self.key_count
    }

    /// Chart length in milliseconds.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn tempo(&self) -> &TempoMap {
        &self.tempo
    }

    /// Hit objects sorted by start time.
    pub fn hit_objects(&self) -> &[HitObjectInfo] {
        &self.hit_objects
    }

    pub fn timing_lines(&self) -> &[TimingLineMarker] {
        &self.timing_lines
    }

    pub fn time_to_position(&self, time: f64) -> f64 {
        self.tempo.time_to_position(time)
    }

    /// Total number of judgments a full play produces.
    pub fn judgment_target_count(&self) -> usize {
        self.hit_objects.iter().map(HitObjectInfo::judgment_count).sum()
    }

    /// Time of the last head or tail in the chart.
    pub fn last_object_time(&self) -> Option<f64> {
        self.hit_objects
            .iter()
            .map(HitObjectInfo::last_time)
            .reduce(f64::max)
    }
}

/// Generate one marker per measure from the first tempo segment up to `length`.
///
/// When the running time reaches the next segment's start (minus a 1ms
/// tolerance) it snaps to that start and continues with the new measure length.
pub fn generate_timing_lines(tempo: &TempoMap, length: f64) -> Result<Vec<TimingLineMarker>> {
    let segments = tempo.segments();
    let mut index = 0;
    let mut time = segments[0].start_time;
    let mut increment = checked_increment(&segments[0])?;

    let marker = |time: f64| TimingLineMarker {
        time,
        position: tempo.time_to_position(time),
    };

    let mut lines = vec![marker(time)];
    while time < length {
        time += increment;

        if index + 1 < segments.len()
            && time >= segments[index + 1].start_time - SEGMENT_SWITCH_TOLERANCE_MS
        {
            index += 1;
            time = segments[index].start_time;
            increment = checked_increment(&segments[index])?;
        }

        lines.push(marker(time));
        ensure!(
            lines.len() <= MAX_TIMING_LINES,
            "timing line generation exceeded {MAX_TIMING_LINES} markers"
        );
    }

    Ok(lines)
}

fn checked_increment(segment: &TempoSegment) -> Result<f64> {
    let increment = segment.measure_length_ms();
    if !increment.is_finite() || increment <= 0.0 {
        bail!(
            "tempo segment at {} yields measure length {increment}",
            segment.start_time
        );
    }
    Ok(increment)
}
