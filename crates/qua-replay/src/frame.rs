use serde::{Deserialize, Serialize};

pub use qua_model::MAX_KEY_COUNT;

/// Bit for a 1-indexed lane.
pub fn lane_bit(lane: usize) -> u32 {
    debug_assert!((1..=MAX_KEY_COUNT).contains(&lane), "lane out of range: {lane}");
    1u32 << (lane - 1)
}

/// Pressed-key state at an instant. Bit `n` is lane `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Song time in milliseconds.
    pub time: f64,
    pub keys: u32,
}

impl InputFrame {
    pub fn new(time: f64, keys: u32) -> Self {
        Self { time, keys }
    }

    pub fn is_pressed(&self, lane: usize) -> bool {
        self.keys & lane_bit(lane) != 0
    }
}

/// A discrete key transition, from live input or synthesized from a replay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Lane (1-indexed).
    pub lane: usize,
    pub pressed: bool,
    /// Song time in milliseconds.
    pub time: f64,
}

impl KeyEvent {
    pub fn press(lane: usize, time: f64) -> Self {
        Self {
            lane,
            pressed: true,
            time,
        }
    }

    pub fn release(lane: usize, time: f64) -> Self {
        Self {
            lane,
            pressed: false,
            time,
        }
    }
}
