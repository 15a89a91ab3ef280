// Chart data model: hit objects, tempo map, timing lines

mod hit_object;
pub mod tempo;
mod timeline;

pub use hit_object::HitObjectInfo;
pub use tempo::{TempoMap, TempoSegment};
pub use timeline::{ChartData, ChartTimeline, TimingLineMarker, generate_timing_lines};

/// Lanes a chart may have; one bit per lane in replay frames.
pub const MAX_KEY_COUNT: usize = 32;

/// Upper bound on timing lines generated for a single chart.
pub const MAX_TIMING_LINES: usize = 100_000;
