use serde::{Deserialize, Serialize};

use qua_model::{ChartTimeline, HitObjectInfo};
use qua_rule::Grade;

use crate::pool::PoolItem;

/// Lifecycle of a hit object during play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitObjectState {
    /// Not yet in the pool window.
    Pending,
    /// In the window, waiting for input.
    Active,
    /// Hold head hit, waiting for release.
    Held,
    /// Fully resolved by input.
    Judged,
    /// Scrolled out unresolved.
    Missed,
    /// Resolved and recycled.
    Dead,
}

/// A chart object plus its play state.
#[derive(Debug, Clone, PartialEq)]
pub struct HitObject {
    info: HitObjectInfo,
    position: f64,
    end_position: f64,
    state: HitObjectState,
    head: Option<Grade>,
    tail: Option<Grade>,
}

impl HitObject {
    pub fn new(info: HitObjectInfo, timeline: &ChartTimeline) -> Self {
        Self {
            info,
            position: timeline.time_to_position(info.start_time),
            end_position: timeline.time_to_position(info.last_time()),
            state: HitObjectState::Pending,
            head: None,
            tail: None,
        }
    }

    /// One play object per chart object, in timeline order.
    pub fn from_timeline(timeline: &ChartTimeline) -> Vec<Self> {
        timeline
            .hit_objects()
            .iter()
            .map(|info| Self::new(*info, timeline))
            .collect()
    }

    pub fn info(&self) -> &HitObjectInfo {
        &self.info
    }

    pub fn lane(&self) -> usize {
        self.info.lane
    }

    pub fn start_time(&self) -> f64 {
        self.info.start_time
    }

    pub fn end_time(&self) -> Option<f64> {
        self.info.end_time
    }

    pub fn is_hold(&self) -> bool {
        self.info.is_hold()
    }

    pub fn state(&self) -> HitObjectState {
        self.state
    }

    /// Grade of the head, once resolved.
    pub fn head_grade(&self) -> Option<Grade> {
        self.head
    }

    /// Grade of the tail, once resolved (holds only).
    pub fn tail_grade(&self) -> Option<Grade> {
        self.tail
    }

    /// Can still be hit by a press.
    pub fn is_hittable(&self) -> bool {
        matches!(self.state, HitObjectState::Pending | HitObjectState::Active)
    }

    pub(crate) fn resolve_head(&mut self, grade: Grade) {
        self.head = Some(grade);
        self.state = if self.is_hold() {
            HitObjectState::Held
        } else {
            HitObjectState::Judged
        };
    }

    pub(crate) fn resolve_tail(&mut self, grade: Grade) {
        self.tail = Some(grade);
        self.state = HitObjectState::Judged;
    }

    pub(crate) fn mark_missed(&mut self) {
        self.head = Some(Grade::Miss);
        if self.is_hold() {
            self.tail = Some(Grade::Miss);
        }
        self.state = HitObjectState::Missed;
    }

    pub(crate) fn mark_dead(&mut self) {
        self.state = HitObjectState::Dead;
    }
}

impl PoolItem for HitObject {
    fn position(&self) -> f64 {
        self.position
    }

    fn end_position(&self) -> f64 {
        self.end_position
    }

    fn on_activate(&mut self) {
        if self.state == HitObjectState::Pending {
            self.state = HitObjectState::Active;
        }
    }
}
