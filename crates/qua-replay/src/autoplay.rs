//! Autoplay replay generation.

use log::debug;

use qua_model::ChartTimeline;
use qua_rule::{ModSet, Modifier};

use crate::frame::{InputFrame, lane_bit};
use crate::replay::Replay;

/// How long a tap is held (ms).
pub const PRESS_DURATION_MS: f64 = 50.0;

#[derive(Debug, Clone, Copy)]
struct AutoplayEvent {
    time: f64,
    lane: usize,
    pressed: bool,
}

/// Build a replay that hits every object dead on.
///
/// Heads are pressed at their start time; holds release at their end, taps
/// after [`PRESS_DURATION_MS`]. A release never reaches the next press in
/// the same lane.
pub fn generate_autoplay(timeline: &ChartTimeline) -> Replay {
    let mut events = Vec::with_capacity(timeline.hit_objects().len() * 2);

    for lane in 1..=timeline.key_count() {
        let objects: Vec<_> = timeline
            .hit_objects()
            .iter()
            .filter(|o| o.lane == lane)
            .collect();

        for (i, obj) in objects.iter().enumerate() {
            let press = obj.start_time;
            let mut release = obj.end_time.unwrap_or(press + PRESS_DURATION_MS);
            if let Some(next) = objects.get(i + 1)
                && release >= next.start_time
            {
                release = press + (next.start_time - press) / 2.0;
            }

            events.push(AutoplayEvent {
                time: press,
                lane,
                pressed: true,
            });
            events.push(AutoplayEvent {
                time: release,
                lane,
                pressed: false,
            });
        }
    }

    events.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut frames: Vec<InputFrame> = Vec::with_capacity(events.len());
    let mut keys = 0u32;
    for event in events {
        if event.pressed {
            keys |= lane_bit(event.lane);
        } else {
            keys &= !lane_bit(event.lane);
        }
        match frames.last_mut() {
            Some(last) if last.time == event.time => last.keys = keys,
            _ => frames.push(InputFrame::new(event.time, keys)),
        }
    }

    debug!("autoplay generated {} frames", frames.len());

    let mods: ModSet = [Modifier::Autoplay].into_iter().collect();
    let mut replay = Replay::new(timeline.key_count(), mods, frames);
    replay.player = "Autoplay".to_string();
    replay
}
