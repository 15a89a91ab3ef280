use qua_rule::ModSet;

use crate::frame::{InputFrame, KeyEvent, MAX_KEY_COUNT, lane_bit};
use crate::replay::{Replay, ReplaySummary};

/// Captures live key events as replay frames.
///
/// A frame is appended only when the pressed bitmask actually changes.
/// Frame times never decrease: an event older than the last frame is
/// stamped with that frame's time.
#[derive(Debug, Clone)]
pub struct ReplayRecorder {
    key_count: usize,
    keys: u32,
    frames: Vec<InputFrame>,
}

impl ReplayRecorder {
    pub fn new(key_count: usize) -> Self {
        Self {
            key_count: key_count.min(MAX_KEY_COUNT),
            keys: 0,
            frames: Vec::new(),
        }
    }

    /// Record a key event. Returns whether a frame was written.
    pub fn record(&mut self, event: &KeyEvent) -> bool {
        if event.lane == 0 || event.lane > self.key_count {
            return false;
        }
        let next = if event.pressed {
            self.keys | lane_bit(event.lane)
        } else {
            self.keys & !lane_bit(event.lane)
        };
        if next == self.keys {
            return false;
        }
        self.keys = next;
        let time = match self.frames.last() {
            Some(last) => event.time.max(last.time),
            None => event.time,
        };
        self.frames.push(InputFrame::new(time, next));
        true
    }

    /// Bitmask of lanes currently down.
    pub fn keys(&self) -> u32 {
        self.keys
    }

    pub fn frames(&self) -> &[InputFrame] {
        &self.frames
    }

    pub fn into_replay(self, mods: ModSet, summary: Option<ReplaySummary>) -> Replay {
        let mut replay = Replay::new(self.key_count, mods, self.frames);
        replay.summary = summary;
        replay
    }
}
