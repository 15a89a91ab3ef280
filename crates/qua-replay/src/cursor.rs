use anyhow::{Result, bail};
use log::error;

use crate::frame::{InputFrame, KeyEvent, MAX_KEY_COUNT};

/// Walks replay frames in lockstep with the playback clock, turning bitmask
/// changes back into key events.
#[derive(Debug, Clone)]
pub struct ReplayCursor {
    frames: Vec<InputFrame>,
    key_count: usize,
    /// Next frame to consume.
    index: usize,
    /// Bitmask of the last consumed frame.
    previous: u32,
}

impl ReplayCursor {
    /// Create a cursor, rejecting unordered or out-of-range frames.
    pub fn new(frames: Vec<InputFrame>, key_count: usize) -> Result<Self> {
        if key_count == 0 || key_count > MAX_KEY_COUNT {
            bail!("replay key count {key_count} outside 1..={MAX_KEY_COUNT}");
        }
        let lane_mask = if key_count == MAX_KEY_COUNT {
            u32::MAX
        } else {
            (1u32 << key_count) - 1
        };

        let mut last = f64::NEG_INFINITY;
        for (i, frame) in frames.iter().enumerate() {
            if !frame.time.is_finite() {
                error!("replay frame {i} has non-finite time");
                bail!("replay frame {i} has non-finite time");
            }
            if frame.time < last {
                error!("replay frame {i} at {} precedes {last}", frame.time);
                bail!("replay frames out of order at {i}: {} < {last}", frame.time);
            }
            if frame.keys & !lane_mask != 0 {
                bail!(
                    "replay frame {i} presses lanes beyond {key_count}: {:#b}",
                    frame.keys
                );
            }
            last = frame.time;
        }

        Ok(Self {
            frames,
            key_count,
            index: 0,
            previous: 0,
        })
    }

    /// Consume at most one frame due at `current_time` and return its key
    /// transitions in lane order, stamped with the frame's own time.
    ///
    /// A frame with no change is still consumed and yields no events.
    pub fn advance(&mut self, current_time: f64) -> Vec<KeyEvent> {
        let Some(frame) = self.frames.get(self.index).copied() else {
            return Vec::new();
        };
        if frame.time > current_time {
            return Vec::new();
        }

        let changed = frame.keys ^ self.previous;
        let events = (1..=self.key_count)
            .filter(|lane| changed & (1 << (lane - 1)) != 0)
            .map(|lane| KeyEvent {
                lane,
                pressed: frame.is_pressed(lane),
                time: frame.time,
            })
            .collect();

        self.previous = frame.keys;
        self.index += 1;
        events
    }

    /// Consume every frame due at `current_time`, one at a time.
    pub fn poll_up_to(&mut self, current_time: f64) -> Vec<KeyEvent> {
        let mut events = Vec::new();
        while self.has_due(current_time) {
            events.extend(self.advance(current_time));
        }
        events
    }

    /// Whether a frame at or before `current_time` is still pending.
    pub fn has_due(&self, current_time: f64) -> bool {
        self.frames
            .get(self.index)
            .is_some_and(|f| f.time <= current_time)
    }

    /// Jump to the last frame at or before `time` without emitting events.
    pub fn seek(&mut self, time: f64) {
        self.index = self.frames.partition_point(|f| f.time <= time);
        self.previous = match self.index {
            0 => 0,
            i => self.frames[i - 1].keys,
        };
    }

    pub fn is_pressed(&self, lane: usize) -> bool {
        lane >= 1 && lane <= self.key_count && self.previous & (1 << (lane - 1)) != 0
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.frames.len()
    }

    /// Index of the next frame to consume.
    pub fn position(&self) -> usize {
        self.index
    }

    pub fn frames(&self) -> &[InputFrame] {
        &self.frames
    }
}
