//! Playback clock synchronized to an audio track.

use anyhow::Result;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::TimeCorrection;

/// Audio output as seen by the clock. Read-only apart from starting,
/// pausing, seeking and rate changes.
pub trait AudioTrack {
    /// Start playback.
    fn play(&mut self) -> Result<()>;

    /// Whether the device confirms the track is playing.
    fn is_playing(&self) -> bool;

    /// Device-reported playback position (ms), when available.
    fn position_ms(&self) -> Option<f64>;

    /// Move playback to `time_ms`.
    fn seek(&mut self, _time_ms: f64) -> Result<()> {
        Ok(())
    }

    fn set_rate(&mut self, _rate: f64) {}

    /// Halt playback, keeping the position.
    fn pause(&mut self) -> Result<()> {
        Ok(())
    }

    /// Continue playback from the paused position.
    fn resume(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Track that never plays. The clock runs purely on delta time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentTrack;

impl AudioTrack for SilentTrack {
    fn play(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_playing(&self) -> bool {
        false
    }

    fn position_ms(&self) -> Option<f64> {
        None
    }
}

/// Snapshot of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockState {
    /// Virtual song time (ms).
    pub time: f64,
    pub rate: f64,
    /// Audio start has been attempted.
    pub started: bool,
    pub paused: bool,
}

/// Monotonic virtual song time.
///
/// Starts at `-start_delay * rate` and counts up on delta time until zero,
/// then starts the audio once. While the track reports playing, each tick
/// moves toward the reported position by a bounded step.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    state: ClockState,
    failed: bool,
    correction: TimeCorrection,
    audio_error: Option<String>,
}

impl PlaybackClock {
    pub fn new(start_delay_ms: f64, rate: f64, correction: TimeCorrection) -> Self {
        Self {
            state: ClockState {
                time: -start_delay_ms * rate,
                rate,
                started: false,
                paused: false,
            },
            failed: false,
            correction,
            audio_error: None,
        }
    }

    /// Advance by `delta_ms` of wall time and return the new virtual time.
    ///
    /// No-op while paused or failed, and for non-positive deltas.
    pub fn advance(&mut self, delta_ms: f64, audio: &mut dyn AudioTrack) -> f64 {
        if self.state.paused || self.failed || !(delta_ms > 0.0) {
            return self.state.time;
        }

        let step = delta_ms * self.state.rate;

        if self.state.time < 0.0 {
            self.state.time += step;
            return self.state.time;
        }

        if !self.state.started {
            self.start_audio(audio);
        }

        let reported = if self.audio_error.is_none() && audio.is_playing() {
            audio.position_ms()
        } else {
            None
        };

        let predicted = self.state.time + step;
        self.state.time = match reported {
            Some(position) if position.is_finite() => {
                let limit = self.correction.max_correction_ms;
                let nudge = ((position - predicted) * self.correction.blend).clamp(-limit, limit);
                (predicted + nudge).max(self.state.time)
            }
            _ => predicted,
        };
        self.state.time
    }

    fn start_audio(&mut self, audio: &mut dyn AudioTrack) {
        self.state.started = true;
        audio.set_rate(self.state.rate);

        let result = if self.state.time > 0.0 {
            audio.seek(self.state.time).and_then(|()| audio.play())
        } else {
            audio.play()
        };

        match result {
            Ok(()) => info!("audio started at {:.1}ms", self.state.time),
            Err(e) => {
                warn!("audio failed to start, falling back to delta time: {e:#}");
                self.audio_error = Some(format!("{e:#}"));
            }
        }
    }

    /// Jump to `time_ms`, seeking the track if it is already running.
    pub fn seek(&mut self, time_ms: f64, audio: &mut dyn AudioTrack) {
        self.state.time = time_ms;
        if self.audio_running()
            && let Err(e) = audio.seek(time_ms)
        {
            warn!("audio seek to {time_ms:.1}ms failed: {e:#}");
        }
        debug!("clock moved to {time_ms:.1}ms");
    }

    /// Change the speed multiplier for subsequent ticks.
    pub fn set_rate(&mut self, rate: f64, audio: &mut dyn AudioTrack) {
        self.state.rate = rate;
        if self.state.started {
            audio.set_rate(rate);
        }
    }

    pub fn set_correction(&mut self, correction: TimeCorrection) {
        self.correction = correction;
    }

    /// Freeze the clock, holding the track once it has started.
    pub fn pause(&mut self, audio: &mut dyn AudioTrack) {
        if self.state.paused {
            return;
        }
        self.state.paused = true;
        if self.audio_running()
            && let Err(e) = audio.pause()
        {
            warn!("audio pause failed: {e:#}");
        }
        debug!("clock paused at {:.1}ms", self.state.time);
    }

    pub fn resume(&mut self, audio: &mut dyn AudioTrack) {
        if !self.state.paused {
            return;
        }
        self.state.paused = false;
        if self.audio_running()
            && let Err(e) = audio.resume()
        {
            warn!("audio resume failed: {e:#}");
        }
        debug!("clock resumed at {:.1}ms", self.state.time);
    }

    fn audio_running(&self) -> bool {
        self.state.started && self.audio_error.is_none()
    }

    /// Freeze the clock permanently.
    pub fn fail(&mut self) {
        self.failed = true;
    }

    pub fn time(&self) -> f64 {
        self.state.time
    }

    pub fn rate(&self) -> f64 {
        self.state.rate
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Audio start failure message, if any.
    pub fn audio_error(&self) -> Option<&str> {
        self.audio_error.as_deref()
    }
}
