//! Gameplay session: one tick runs clock, pools and judgment in order.

use anyhow::{Context, Result, bail, ensure};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use qua_model::ChartTimeline;
use qua_replay::{KeyEvent, Replay, ReplayCursor, ReplayRecorder, ReplaySummary};
use qua_rule::{ModSet, ScoreState};

use crate::clock::{AudioTrack, PlaybackClock};
use crate::config::{ResolvedConfig, SettingsHandle};
use crate::hit_object::HitObject;
use crate::judge::{JudgmentEngine, JudgmentRecord};
use crate::pool::ObjectPool;
use crate::timing_line::TimingLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    Playing,
    Paused,
    /// Health ran out.
    Failed,
    /// Every object resolved and the finish margin elapsed.
    Finished,
    /// Torn down by the player; nothing is kept.
    Quit,
}

/// Where key events come from.
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Events pushed by the input layer, consumed once the clock reaches them.
    Live { pending: Vec<KeyEvent> },
    Replay(ReplayCursor),
}

impl InputSource {
    pub fn live() -> Self {
        Self::Live {
            pending: Vec::new(),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub time: f64,
    pub new_judgments: Vec<JudgmentRecord>,
    pub phase: SessionPhase,
}

/// Outcome handed to persistence once the tick loop stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub score: ScoreState,
    pub summary: ReplaySummary,
    pub log: Vec<JudgmentRecord>,
    pub phase: SessionPhase,
    /// Captured input for live sessions.
    #[serde(skip)]
    pub replay: Option<Replay>,
}

pub struct GameplaySession {
    timeline: ChartTimeline,
    settings: SettingsHandle,
    generation: u64,
    mods: ModSet,
    config: ResolvedConfig,
    finish_margin_ms: f64,
    clock: PlaybackClock,
    audio: Box<dyn AudioTrack>,
    hit_pool: ObjectPool<HitObject>,
    line_pool: ObjectPool<TimingLine>,
    engine: JudgmentEngine,
    input: InputSource,
    /// Time of the latest input handed to the engine.
    last_input_time: f64,
    recorder: Option<ReplayRecorder>,
    phase: SessionPhase,
}

impl GameplaySession {
    pub fn new(
        timeline: ChartTimeline,
        settings: SettingsHandle,
        audio: Box<dyn AudioTrack>,
        input: InputSource,
    ) -> Result<Self> {
        let (generation, snapshot) = settings.snapshot();
        let config = snapshot.resolve().context("Invalid session config")?;

        let clock = PlaybackClock::new(
            snapshot.start_delay_ms,
            config.rate,
            config.time_correction,
        );
        let track = timeline.time_to_position(clock.time());
        let hit_pool = ObjectPool::new(
            HitObject::from_timeline(&timeline),
            config.window,
            snapshot.initial_pool_size,
            track,
        );
        let line_pool = TimingLine::pool(
            &timeline,
            config.window,
            snapshot.initial_pool_size,
            track,
        );
        let engine = JudgmentEngine::new(
            timeline.key_count(),
            config.judge.clone(),
            config.score_multiplier,
        );
        let recorder = match input {
            InputSource::Live { .. } => Some(ReplayRecorder::new(timeline.key_count())),
            InputSource::Replay(_) => None,
        };

        info!(
            "session start: {} objects, {} lines, rate {:.2}",
            hit_pool.len(),
            line_pool.len(),
            config.rate
        );

        Ok(Self {
            timeline,
            settings,
            generation,
            mods: snapshot.mods,
            config,
            finish_margin_ms: snapshot.finish_margin_ms,
            clock,
            audio,
            hit_pool,
            line_pool,
            engine,
            input,
            last_input_time: f64::NEG_INFINITY,
            recorder,
            phase: SessionPhase::Playing,
        })
    }

    /// Session driven by live key events.
    pub fn live(
        timeline: ChartTimeline,
        settings: SettingsHandle,
        audio: Box<dyn AudioTrack>,
    ) -> Result<Self> {
        Self::new(timeline, settings, audio, InputSource::live())
    }

    /// Session driven by a recorded replay.
    ///
    /// The replay's mods replace those in `settings`, so it is judged under
    /// the rules it was recorded with.
    pub fn replay(
        timeline: ChartTimeline,
        settings: SettingsHandle,
        audio: Box<dyn AudioTrack>,
        replay: &Replay,
    ) -> Result<Self> {
        ensure!(
            replay.key_count == timeline.key_count(),
            "replay has {} keys, chart has {}",
            replay.key_count,
            timeline.key_count()
        );
        let cursor = replay.cursor()?;
        if settings.snapshot().1.mods != replay.mods {
            let mods = replay.mods.clone();
            settings.update(|c| c.mods = mods);
            debug!("using replay mods {:?}", replay.mods);
        }
        Self::new(timeline, settings, audio, InputSource::Replay(cursor))
    }

    /// Advance by `delta_ms` of wall time.
    pub fn tick(&mut self, delta_ms: f64) -> TickReport {
        let before = self.engine.resolved();
        if self.phase == SessionPhase::Playing {
            self.apply_settings();
            let time = self.clock.advance(delta_ms, self.audio.as_mut());
            self.step(time);
        }
        TickReport {
            time: self.clock.time(),
            new_judgments: self.engine.log()[before..].to_vec(),
            phase: self.phase,
        }
    }

    /// Pick up a settings change made since the last tick.
    fn apply_settings(&mut self) {
        let (generation, snapshot) = self.settings.snapshot();
        if generation == self.generation {
            return;
        }
        self.generation = generation;

        let config = match snapshot.resolve() {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring settings generation {generation}: {e:#}");
                return;
            }
        };
        self.clock.set_rate(config.rate, self.audio.as_mut());
        self.clock.set_correction(config.time_correction);
        self.engine.set_config(config.judge.clone(), config.score_multiplier);
        self.hit_pool.set_window(config.window);
        self.line_pool.set_window(config.window);
        self.finish_margin_ms = snapshot.finish_margin_ms;
        self.mods = snapshot.mods;
        self.config = config;
        debug!("applied settings generation {generation}");
    }

    fn step(&mut self, time: f64) {
        let track = self.timeline.time_to_position(time);

        let retired = self.hit_pool.sync(track);
        self.engine.handle_retired(&mut self.hit_pool, &retired);
        self.line_pool.sync(track);

        for event in self.take_input(time) {
            self.engine.handle_event(&mut self.hit_pool, &event);
        }
        self.engine.check_hold_timeouts(&mut self.hit_pool, time);

        if !self.config.no_fail && self.engine.score().is_health_empty() {
            self.clock.fail();
            self.phase = SessionPhase::Failed;
            info!("session failed at {time:.1}ms");
            return;
        }

        let end = self
            .timeline
            .last_object_time()
            .unwrap_or_else(|| self.timeline.length());
        if self.engine.resolved() >= self.timeline.judgment_target_count()
            && time >= end + self.finish_margin_ms
        {
            self.phase = SessionPhase::Finished;
            info!(
                "session finished: score {:.0}, accuracy {:.2}%",
                self.engine.score().score(),
                self.engine.score().accuracy()
            );
        }
    }

    /// Events due at `time`, in time order.
    ///
    /// Live events stamped before input already handed to the engine are
    /// moved up to that time, so the captured replay stays ordered.
    fn take_input(&mut self, time: f64) -> Vec<KeyEvent> {
        let events = match &mut self.input {
            InputSource::Live { pending } => {
                let (mut due, rest): (Vec<KeyEvent>, Vec<KeyEvent>) =
                    pending.drain(..).partition(|e| e.time <= time);
                *pending = rest;
                due.sort_by(|a, b| a.time.total_cmp(&b.time));
                for event in &mut due {
                    if event.time < self.last_input_time {
                        debug!(
                            "late key event at {:.1}ms moved to {:.1}ms",
                            event.time, self.last_input_time
                        );
                        event.time = self.last_input_time;
                    }
                }
                if let Some(recorder) = &mut self.recorder {
                    for event in &due {
                        recorder.record(event);
                    }
                }
                due
            }
            InputSource::Replay(cursor) => cursor.poll_up_to(time),
        };
        if let Some(last) = events.last() {
            self.last_input_time = last.time;
        }
        events
    }

    /// Queue a live key event. Ignored for replay sessions.
    pub fn push_key_event(&mut self, event: KeyEvent) {
        match &mut self.input {
            InputSource::Live { pending } => pending.push(event),
            InputSource::Replay(_) => debug!("dropping live input during replay"),
        }
    }

    pub fn pause(&mut self) {
        if self.phase == SessionPhase::Playing {
            self.clock.pause(self.audio.as_mut());
            self.phase = SessionPhase::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.phase == SessionPhase::Paused {
            self.clock.resume(self.audio.as_mut());
            self.phase = SessionPhase::Playing;
        }
    }

    /// Tear down pools and drop the unflushed log.
    pub fn quit(&mut self) {
        self.hit_pool.clear();
        self.line_pool.clear();
        self.engine.discard();
        self.recorder = None;
        self.phase = SessionPhase::Quit;
        info!("session quit");
    }

    /// Jump forward to `time`. Objects skipped over resolve as misses.
    pub fn skip_to(&mut self, time: f64) -> Result<()> {
        if !matches!(self.phase, SessionPhase::Playing | SessionPhase::Paused) {
            bail!("cannot skip in phase {:?}", self.phase);
        }
        let now = self.clock.time();
        ensure!(time.is_finite(), "skip target must be finite");
        ensure!(time >= now, "cannot skip backwards ({time} < {now})");

        self.clock.seek(time, self.audio.as_mut());
        match &mut self.input {
            InputSource::Live { pending } => pending.retain(|e| e.time > time),
            InputSource::Replay(cursor) => cursor.seek(time),
        }

        // Same order a replay of the captured input sees: holds that ran out,
        // objects left behind, then the release of every key at the skip point.
        self.engine.check_hold_timeouts(&mut self.hit_pool, time);
        let track = self.timeline.time_to_position(time);
        let retired = self.hit_pool.sync(track);
        self.engine.handle_retired(&mut self.hit_pool, &retired);
        self.line_pool.sync(track);
        self.engine.release_all(&mut self.hit_pool, time);
        if let Some(recorder) = &mut self.recorder {
            for lane in 1..=self.timeline.key_count() {
                recorder.record(&KeyEvent::release(lane, time));
            }
        }
        self.last_input_time = self.last_input_time.max(time);
        info!("skipped from {now:.1}ms to {time:.1}ms");

        if self.phase == SessionPhase::Playing {
            self.step(time);
        }
        Ok(())
    }

    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn timeline(&self) -> &ChartTimeline {
        &self.timeline
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn score(&self) -> &ScoreState {
        self.engine.score()
    }

    pub fn log(&self) -> &[JudgmentRecord] {
        self.engine.log()
    }

    pub fn hit_pool(&self) -> &ObjectPool<HitObject> {
        &self.hit_pool
    }

    /// Hit objects currently in the window (for the renderer).
    pub fn active_objects(&self) -> impl Iterator<Item = &HitObject> {
        self.hit_pool.active_items()
    }

    /// Timing lines currently in the window.
    pub fn active_lines(&self) -> impl Iterator<Item = &TimingLine> {
        self.line_pool.active_items()
    }

    /// Current scroll position.
    pub fn track_position(&self) -> f64 {
        self.timeline.time_to_position(self.clock.time())
    }

    pub fn is_done(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Failed | SessionPhase::Finished | SessionPhase::Quit
        )
    }

    pub fn into_result(self) -> SessionResult {
        let failed = self.phase == SessionPhase::Failed;
        let (score, log) = self.engine.into_parts();
        let summary = ReplaySummary::from_score(&score, failed);
        let replay = self
            .recorder
            .map(|r| r.into_replay(self.mods, Some(summary.clone())));
        SessionResult {
            score,
            summary,
            log,
            phase: self.phase,
            replay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SilentTrack;
    use crate::config::SessionConfig;
    use qua_model::{ChartData, HitObjectInfo, TempoSegment};
    use qua_rule::{Grade, JudgeConfig, Modifier};

    fn timeline(objects: Vec<HitObjectInfo>) -> ChartTimeline {
        ChartTimeline::new(ChartData {
            key_count: 4,
            length: None,
            tempo: vec![TempoSegment::new(0.0, 120.0)],
            hit_objects: objects,
        })
        .unwrap()
    }

    fn settings() -> SettingsHandle {
        SettingsHandle::new(SessionConfig {
            start_delay_ms: 0.0,
            ..Default::default()
        })
    }

    fn live(objects: Vec<HitObjectInfo>) -> GameplaySession {
        GameplaySession::live(timeline(objects), settings(), Box::new(SilentTrack)).unwrap()
    }

    #[test]
    fn live_press_is_judged_on_its_tick() {
        let mut session = live(vec![HitObjectInfo::tap(1, 1000.0)]);
        session.tick(990.0);
        session.push_key_event(KeyEvent::press(1, 1005.0));
        assert!(session.tick(10.0).new_judgments.is_empty());

        let report = session.tick(10.0);
        assert_eq!(report.new_judgments.len(), 1);
        assert_eq!(report.new_judgments[0].grade, Grade::Marvelous);
        assert_eq!(report.new_judgments[0].error_ms, 5.0);
    }

    #[test]
    fn pause_freezes_everything() {
        let mut session = live(vec![HitObjectInfo::tap(1, 1000.0)]);
        session.tick(500.0);
        session.pause();
        let report = session.tick(10_000.0);
        assert_eq!(report.time, 500.0);
        assert_eq!(report.phase, SessionPhase::Paused);
        assert!(session.log().is_empty());

        session.resume();
        session.tick(100.0);
        assert_eq!(session.time(), 600.0);
    }

    #[test]
    fn finishes_after_margin() {
        let mut session = live(vec![HitObjectInfo::tap(1, 1000.0)]);
        session.tick(1000.0);
        session.push_key_event(KeyEvent::press(1, 1000.0));
        session.tick(1.0);
        assert_eq!(session.phase(), SessionPhase::Playing);
        session.tick(499.0);
        assert_eq!(session.phase(), SessionPhase::Finished);
        assert!(session.is_done());
    }

    #[test]
    fn health_depletion_fails() {
        let objects = (0..40).map(|i| HitObjectInfo::tap(1, 100.0 + i as f64 * 10.0)).collect();
        let mut session = live(objects);
        for _ in 0..50 {
            session.tick(100.0);
        }
        assert_eq!(session.phase(), SessionPhase::Failed);
        assert!(session.clock().is_failed());
        let time = session.time();
        session.tick(100.0);
        assert_eq!(session.time(), time);
    }

    #[test]
    fn no_fail_keeps_playing() {
        let objects = (0..40).map(|i| HitObjectInfo::tap(1, 100.0 + i as f64 * 10.0)).collect();
        let handle = settings();
        handle.update(|c| {
            c.mods.add(Modifier::NoFail);
        });
        let mut session =
            GameplaySession::live(timeline(objects), handle, Box::new(SilentTrack)).unwrap();
        for _ in 0..60 {
            session.tick(100.0);
        }
        assert_eq!(session.phase(), SessionPhase::Finished);
        assert_eq!(session.score().count(Grade::Miss), 40);
    }

    #[test]
    fn settings_change_applies_next_tick() {
        let handle = settings();
        let mut session = GameplaySession::live(
            timeline(vec![HitObjectInfo::tap(1, 5000.0)]),
            handle.clone(),
            Box::new(SilentTrack),
        )
        .unwrap();
        session.tick(100.0);
        handle.update(|c| c.rate = 2.0);
        session.tick(100.0);
        assert_eq!(session.time(), 300.0);
        assert_eq!(session.clock().rate(), 2.0);
    }

    #[test]
    fn invalid_settings_change_is_ignored() {
        let handle = settings();
        let mut session = GameplaySession::live(
            timeline(vec![HitObjectInfo::tap(1, 5000.0)]),
            handle.clone(),
            Box::new(SilentTrack),
        )
        .unwrap();
        handle.update(|c| c.rate = -1.0);
        session.tick(100.0);
        assert_eq!(session.clock().rate(), 1.0);
    }

    #[test]
    fn quit_discards_state() {
        let mut session = live(vec![HitObjectInfo::tap(1, 1000.0)]);
        session.tick(1000.0);
        session.push_key_event(KeyEvent::press(1, 1000.0));
        session.tick(1.0);
        session.quit();
        assert!(session.log().is_empty());
        assert_eq!(session.active_objects().count(), 0);
        let result = session.into_result();
        assert_eq!(result.phase, SessionPhase::Quit);
        assert!(result.replay.is_none());
    }

    #[test]
    fn skip_forward_misses_skipped_objects() {
        let mut session = live(vec![
            HitObjectInfo::tap(1, 1000.0),
            HitObjectInfo::tap(2, 8000.0),
        ]);
        session.skip_to(5000.0).unwrap();
        assert_eq!(session.time(), 5000.0);
        assert_eq!(session.log().len(), 1);
        assert_eq!(session.log()[0].grade, Grade::Miss);
        assert!(session.skip_to(100.0).is_err());
    }

    #[test]
    fn live_result_carries_replay() {
        let mut session = live(vec![HitObjectInfo::tap(1, 1000.0)]);
        session.push_key_event(KeyEvent::press(1, 1000.0));
        session.push_key_event(KeyEvent::release(1, 1040.0));
        session.tick(1100.0);
        let result = session.into_result();
        let replay = result.replay.unwrap();
        assert_eq!(replay.frames.len(), 2);
        assert_eq!(replay.summary.unwrap().counts[Grade::Marvelous.index()], 1);
    }

    #[test]
    fn late_live_event_is_moved_up() {
        let mut session = live(vec![
            HitObjectInfo::tap(1, 1000.0),
            HitObjectInfo::tap(2, 1010.0),
        ]);
        session.push_key_event(KeyEvent::press(2, 1010.0));
        session.tick(1020.0);
        session.push_key_event(KeyEvent::press(1, 1005.0));
        let report = session.tick(10.0);
        assert_eq!(report.new_judgments.len(), 1);
        assert_eq!(report.new_judgments[0].time, 1010.0);
        assert_eq!(report.new_judgments[0].error_ms, 10.0);

        let replay = session.into_result().replay.unwrap();
        let times: Vec<f64> = replay.frames.iter().map(|f| f.time).collect();
        assert_eq!(times, vec![1010.0, 1010.0]);
        let replayed = GameplaySession::replay(
            timeline(Vec::new()),
            settings(),
            Box::new(SilentTrack),
            &replay,
        );
        assert!(replayed.is_ok());
    }

    #[test]
    fn replay_brings_its_mods() {
        let mods: ModSet = [Modifier::Strict].into_iter().collect();
        let replay = Replay::new(4, mods, Vec::new());
        let handle = settings();
        let session = GameplaySession::replay(
            timeline(Vec::new()),
            handle.clone(),
            Box::new(SilentTrack),
            &replay,
        )
        .unwrap();
        assert!(handle.snapshot().1.mods.contains(&Modifier::Strict));
        let strict = JudgeConfig::default().with_window_scale(0.8);
        assert_eq!(session.config().judge, strict);
    }

    #[test]
    fn replay_key_count_must_match() {
        let replay = Replay::new(7, ModSet::new(), Vec::new());
        let result = GameplaySession::replay(
            timeline(Vec::new()),
            settings(),
            Box::new(SilentTrack),
            &replay,
        );
        assert!(result.is_err());
    }
}
