use qua_model::{ChartTimeline, TimingLineMarker};

use crate::pool::{ObjectPool, PoolItem, PoolWindow};

/// A measure line scheduled through the pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingLine {
    pub marker: TimingLineMarker,
    pub visible: bool,
}

impl TimingLine {
    pub fn new(marker: TimingLineMarker) -> Self {
        Self {
            marker,
            visible: false,
        }
    }

    /// Line pool for a chart, seeded at `track_position`.
    pub fn pool(
        timeline: &ChartTimeline,
        window: PoolWindow,
        initial_size: usize,
        track_position: f64,
    ) -> ObjectPool<TimingLine> {
        let lines = timeline
            .timing_lines()
            .iter()
            .map(|m| TimingLine::new(*m))
            .collect();
        ObjectPool::new(lines, window, initial_size, track_position)
    }
}

impl PoolItem for TimingLine {
    fn position(&self) -> f64 {
        self.marker.position
    }

    fn on_activate(&mut self) {
        self.visible = true;
    }

    fn on_retire(&mut self) {
        self.visible = false;
    }
}
