//! Judgment engine.
//!
//! Matches key events against hit objects, classifies timing errors and
//! feeds score/combo/health. Every resolution appends one record to the log;
//! the log depends only on the chart and the input sequence.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use qua_replay::KeyEvent;
use qua_rule::{GhostPenalty, Grade, JudgeConfig, ScoreState};

use crate::hit_object::{HitObject, HitObjectState};
use crate::pool::ObjectPool;

/// Which end of an object a record judges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JudgedPart {
    Head,
    Tail,
}

/// One resolved judgment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JudgmentRecord {
    /// Index of the object in timeline order.
    pub object: usize,
    pub lane: usize,
    pub part: JudgedPart,
    pub grade: Grade,
    /// Signed error (input time minus target time), 0 for autonomous misses.
    pub error_ms: f64,
    /// Input time, or the target/deadline time for judgments without input.
    pub time: f64,
    pub score_delta: f64,
    pub combo_after: u32,
    pub health_delta: f64,
    pub health_after: f64,
}

impl JudgmentRecord {
    fn new(
        object: usize,
        lane: usize,
        part: JudgedPart,
        grade: Grade,
        error_ms: f64,
        time: f64,
    ) -> Self {
        Self {
            object,
            lane,
            part,
            grade,
            error_ms,
            time,
            score_delta: 0.0,
            combo_after: 0,
            health_delta: 0.0,
            health_after: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LaneState {
    pressed: bool,
    /// Object whose head was hit and awaits release.
    holding: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct JudgmentEngine {
    config: JudgeConfig,
    score_multiplier: f64,
    lanes: Vec<LaneState>,
    score: ScoreState,
    log: Vec<JudgmentRecord>,
}

impl JudgmentEngine {
    pub fn new(key_count: usize, config: JudgeConfig, score_multiplier: f64) -> Self {
        Self {
            config,
            score_multiplier,
            lanes: vec![LaneState::default(); key_count],
            score: ScoreState::default(),
            log: Vec::new(),
        }
    }

    /// Replace the judging rules for subsequent events.
    pub fn set_config(&mut self, config: JudgeConfig, score_multiplier: f64) {
        self.config = config;
        self.score_multiplier = score_multiplier;
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Process a key transition. Returns the record it produced, if any.
    pub fn handle_event(
        &mut self,
        pool: &mut ObjectPool<HitObject>,
        event: &KeyEvent,
    ) -> Option<JudgmentRecord> {
        let Some(lane) = event.lane.checked_sub(1).filter(|&i| i < self.lanes.len()) else {
            debug!("ignoring key event for unknown lane {}", event.lane);
            return None;
        };

        if event.pressed {
            if self.lanes[lane].pressed {
                return None;
            }
            self.lanes[lane].pressed = true;
            self.press(pool, event.lane, event.time)
        } else {
            self.lanes[lane].pressed = false;
            let index = self.lanes[lane].holding.take()?;
            self.release(pool, index, event.time)
        }
    }

    fn press(
        &mut self,
        pool: &mut ObjectPool<HitObject>,
        lane: usize,
        time: f64,
    ) -> Option<JudgmentRecord> {
        let Some(index) = self.find_candidate(pool, lane, time) else {
            self.ghost(lane, time);
            return None;
        };
        let obj = pool.get_mut(index)?;

        let error = time - obj.start_time();
        let grade = self.config.tap_windows.classify(error).unwrap_or(Grade::Miss);
        obj.resolve_head(grade);
        if obj.state() == HitObjectState::Held {
            self.lanes[lane - 1].holding = Some(index);
        }

        Some(self.record(
            JudgmentRecord::new(index, lane, JudgedPart::Head, grade, error, time),
            true,
        ))
    }

    /// Earliest hittable object in `lane` within the widest tap window.
    ///
    /// Looks through the active set and the upcoming items already inside
    /// the window.
    fn find_candidate(
        &self,
        pool: &ObjectPool<HitObject>,
        lane: usize,
        time: f64,
    ) -> Option<usize> {
        let widest = self.config.tap_windows.widest();
        let eligible = |i: &usize| {
            pool.get(*i).is_some_and(|o| {
                o.lane() == lane && o.is_hittable() && (time - o.start_time()).abs() <= widest
            })
        };

        let upcoming = pool
            .upcoming()
            .take_while(|&i| pool.get(i).is_some_and(|o| o.start_time() <= time + widest));

        pool.active()
            .iter()
            .copied()
            .chain(upcoming)
            .filter(eligible)
            .min_by(|&a, &b| {
                let (ta, tb) = (pool.items()[a].start_time(), pool.items()[b].start_time());
                ta.total_cmp(&tb).then(a.cmp(&b))
            })
    }

    fn ghost(&mut self, lane: usize, time: f64) {
        trace!("ghost press lane {lane} at {time:.1}");
        if let GhostPenalty::Penalty {
            health,
            break_combo,
        } = self.config.ghost_penalty
        {
            self.score.penalize(health, break_combo);
        }
    }

    fn release(
        &mut self,
        pool: &mut ObjectPool<HitObject>,
        index: usize,
        time: f64,
    ) -> Option<JudgmentRecord> {
        let obj = pool.get_mut(index)?;
        let end = obj.end_time()?;
        let lane = obj.lane();

        let error = time - end;
        let grade = self
            .config
            .tail_windows
            .classify(error)
            .unwrap_or(self.config.release_miss_grade);
        obj.resolve_tail(grade);

        Some(self.record(
            JudgmentRecord::new(index, lane, JudgedPart::Tail, grade, error, time),
            true,
        ))
    }

    /// Resolve objects the pool just retired.
    ///
    /// Unhit objects become misses (head and tail for holds); a hold still
    /// held is force-released.
    pub fn handle_retired(&mut self, pool: &mut ObjectPool<HitObject>, retired: &[usize]) {
        for &index in retired {
            let Some(obj) = pool.get_mut(index) else {
                continue;
            };
            match obj.state() {
                HitObjectState::Pending | HitObjectState::Active => {
                    obj.mark_missed();
                    let lane = obj.lane();
                    let start = obj.start_time();
                    let end = obj.end_time();
                    let miss = |part, time| {
                        JudgmentRecord::new(index, lane, part, Grade::Miss, 0.0, time)
                    };
                    self.record(miss(JudgedPart::Head, start), false);
                    if let Some(end) = end {
                        self.record(miss(JudgedPart::Tail, end), false);
                    }
                }
                HitObjectState::Held => {
                    let lane = obj.lane();
                    self.lanes[lane - 1].holding = None;
                    self.force_release(pool, index);
                    if let Some(obj) = pool.get_mut(index) {
                        obj.mark_dead();
                    }
                }
                HitObjectState::Judged => obj.mark_dead(),
                HitObjectState::Missed | HitObjectState::Dead => {}
            }
        }
    }

    /// Force-release holds whose tail window closed before `time`.
    pub fn check_hold_timeouts(&mut self, pool: &mut ObjectPool<HitObject>, time: f64) {
        let outer = self.config.tail_windows.widest();
        for lane in 0..self.lanes.len() {
            let Some(index) = self.lanes[lane].holding else {
                continue;
            };
            let expired = pool
                .get(index)
                .and_then(HitObject::end_time)
                .is_some_and(|end| time > end + outer);
            if expired {
                self.lanes[lane].holding = None;
                self.force_release(pool, index);
            }
        }
    }

    fn force_release(&mut self, pool: &mut ObjectPool<HitObject>, index: usize) {
        let outer = self.config.tail_windows.widest();
        let Some(obj) = pool.get_mut(index) else {
            return;
        };
        let Some(end) = obj.end_time() else {
            return;
        };
        let lane = obj.lane();
        let grade = self.config.release_miss_grade;
        obj.resolve_tail(grade);
        debug!("hold {index} in lane {lane} never released");

        // Untimed for statistics, but the record carries the outer bound.
        let record =
            JudgmentRecord::new(index, lane, JudgedPart::Tail, grade, outer, end + outer);
        self.record(record, false);
    }

    /// Apply `record` to the score state and append it to the log.
    ///
    /// Untimed records (no input behind them) stay out of the timing stats.
    fn record(&mut self, mut record: JudgmentRecord, timed: bool) -> JudgmentRecord {
        let grade = record.grade;
        let delta = self.score.apply(
            grade,
            timed.then_some(record.error_ms),
            self.config.score.value(grade) * self.score_multiplier,
            self.config.health.delta(grade),
        );
        record.score_delta = delta.score;
        record.combo_after = delta.combo_after;
        record.health_delta = delta.health_delta;
        record.health_after = delta.health_after;

        trace!("{record:?}");
        self.log.push(record);
        record
    }

    /// Lift every lane at `time`, judging held tails as ordinary releases.
    pub fn release_all(
        &mut self,
        pool: &mut ObjectPool<HitObject>,
        time: f64,
    ) -> Vec<JudgmentRecord> {
        let mut records = Vec::new();
        for lane in 0..self.lanes.len() {
            self.lanes[lane].pressed = false;
            if let Some(index) = self.lanes[lane].holding.take() {
                records.extend(self.release(pool, index, time));
            }
        }
        records
    }

    pub fn is_pressed(&self, lane: usize) -> bool {
        lane >= 1 && self.lanes.get(lane - 1).is_some_and(|l| l.pressed)
    }

    pub fn log(&self) -> &[JudgmentRecord] {
        &self.log
    }

    /// Number of resolved judgment targets.
    pub fn resolved(&self) -> usize {
        self.log.len()
    }

    pub fn score(&self) -> &ScoreState {
        &self.score
    }

    /// Drop the log and score state.
    pub fn discard(&mut self) {
        self.log.clear();
        self.score = ScoreState::default();
        self.lanes.fill(LaneState::default());
    }

    pub fn into_parts(self) -> (ScoreState, Vec<JudgmentRecord>) {
        (self.score, self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolWindow;
    use qua_model::{ChartData, ChartTimeline, HitObjectInfo, TempoSegment};

    fn setup(objects: Vec<HitObjectInfo>) -> (ObjectPool<HitObject>, JudgmentEngine) {
        let timeline = ChartTimeline::new(ChartData {
            key_count: 4,
            length: None,
            tempo: vec![TempoSegment::new(0.0, 120.0)],
            hit_objects: objects,
        })
        .unwrap();
        let pool = ObjectPool::new(
            HitObject::from_timeline(&timeline),
            PoolWindow::default(),
            6,
            0.0,
        );
        let engine = JudgmentEngine::new(4, JudgeConfig::default(), 1.0);
        (pool, engine)
    }

    // --- taps ---

    #[test]
    fn press_in_window_judges() {
        let (mut pool, mut engine) = setup(vec![HitObjectInfo::tap(1, 1000.0)]);
        let rec = engine
            .handle_event(&mut pool, &KeyEvent::press(1, 1010.0))
            .unwrap();
        assert_eq!(rec.grade, Grade::Marvelous);
        assert_eq!(rec.error_ms, 10.0);
        assert_eq!(rec.combo_after, 1);
        assert_eq!(pool.get(0).unwrap().state(), HitObjectState::Judged);
    }

    #[test]
    fn early_press_is_negative_error() {
        let (mut pool, mut engine) = setup(vec![HitObjectInfo::tap(1, 1000.0)]);
        let rec = engine
            .handle_event(&mut pool, &KeyEvent::press(1, 950.0))
            .unwrap();
        assert_eq!(rec.grade, Grade::Great);
        assert_eq!(rec.error_ms, -50.0);
        assert_eq!(engine.score().timing().early(), 1);
    }

    #[test]
    fn earliest_candidate_wins() {
        let (mut pool, mut engine) = setup(vec![
            HitObjectInfo::tap(1, 1000.0),
            HitObjectInfo::tap(1, 1100.0),
        ]);
        // 1090 is closer to the second tap but the first is still eligible.
        let rec = engine
            .handle_event(&mut pool, &KeyEvent::press(1, 1090.0))
            .unwrap();
        assert_eq!(rec.object, 0);
        assert_eq!(rec.grade, Grade::Good);
    }

    #[test]
    fn ghost_press_logs_nothing() {
        let (mut pool, mut engine) = setup(vec![HitObjectInfo::tap(1, 1000.0)]);
        assert!(engine.handle_event(&mut pool, &KeyEvent::press(1, 500.0)).is_none());
        assert!(engine.handle_event(&mut pool, &KeyEvent::release(1, 510.0)).is_none());
        assert!(engine.handle_event(&mut pool, &KeyEvent::press(2, 1000.0)).is_none());
        assert!(engine.log().is_empty());
        assert_eq!(engine.score().health(), 100.0);
    }

    #[test]
    fn ghost_penalty_applies_without_record() {
        let (mut pool, _) = setup(vec![HitObjectInfo::tap(1, 1000.0)]);
        let config = JudgeConfig {
            ghost_penalty: GhostPenalty::Penalty {
                health: -5.0,
                break_combo: true,
            },
            ..JudgeConfig::default()
        };
        let mut engine = JudgmentEngine::new(4, config, 1.0);
        engine.handle_event(&mut pool, &KeyEvent::press(3, 200.0));
        assert!(engine.log().is_empty());
        assert_eq!(engine.score().health(), 95.0);
    }

    #[test]
    fn repeated_press_is_ignored() {
        let (mut pool, mut engine) = setup(vec![
            HitObjectInfo::tap(1, 1000.0),
            HitObjectInfo::tap(1, 1050.0),
        ]);
        engine.handle_event(&mut pool, &KeyEvent::press(1, 1000.0));
        assert!(engine.handle_event(&mut pool, &KeyEvent::press(1, 1040.0)).is_none());
        assert_eq!(engine.log().len(), 1);
        assert!(engine.is_pressed(1));
    }

    #[test]
    fn unknown_lane_is_ignored() {
        let (mut pool, mut engine) = setup(vec![HitObjectInfo::tap(1, 1000.0)]);
        assert!(engine.handle_event(&mut pool, &KeyEvent::press(0, 1000.0)).is_none());
        assert!(engine.handle_event(&mut pool, &KeyEvent::press(9, 1000.0)).is_none());
    }

    #[test]
    fn score_uses_multiplier() {
        let (mut pool, _) = setup(vec![HitObjectInfo::tap(1, 1000.0)]);
        let mut engine = JudgmentEngine::new(4, JudgeConfig::default(), 0.5);
        let rec = engine
            .handle_event(&mut pool, &KeyEvent::press(1, 1000.0))
            .unwrap();
        assert_eq!(rec.score_delta, 50.0);
    }

    // --- misses ---

    #[test]
    fn retired_unhit_tap_is_missed() {
        let (mut pool, mut engine) = setup(vec![HitObjectInfo::tap(1, 1000.0)]);
        let retired = pool.sync(2600.0);
        engine.handle_retired(&mut pool, &retired);
        assert_eq!(engine.log().len(), 1);
        let rec = engine.log()[0];
        assert_eq!(rec.grade, Grade::Miss);
        assert_eq!(rec.error_ms, 0.0);
        assert_eq!(rec.combo_after, 0);
        assert_eq!(pool.get(0).unwrap().state(), HitObjectState::Missed);
    }

    #[test]
    fn retired_judged_tap_dies_quietly() {
        let (mut pool, mut engine) = setup(vec![HitObjectInfo::tap(1, 1000.0)]);
        engine.handle_event(&mut pool, &KeyEvent::press(1, 1000.0));
        let retired = pool.sync(2600.0);
        engine.handle_retired(&mut pool, &retired);
        assert_eq!(engine.log().len(), 1);
        assert_eq!(pool.get(0).unwrap().state(), HitObjectState::Dead);
    }

    #[test]
    fn unhit_hold_misses_both_ends() {
        let (mut pool, mut engine) = setup(vec![HitObjectInfo::hold(2, 2000.0, 2500.0)]);
        let retired = pool.sync(4100.0);
        engine.handle_retired(&mut pool, &retired);
        let parts: Vec<(JudgedPart, Grade)> =
            engine.log().iter().map(|r| (r.part, r.grade)).collect();
        assert_eq!(
            parts,
            vec![(JudgedPart::Head, Grade::Miss), (JudgedPart::Tail, Grade::Miss)]
        );
    }

    // --- holds ---

    #[test]
    fn hold_release_on_time() {
        let (mut pool, mut engine) = setup(vec![HitObjectInfo::hold(2, 2000.0, 2500.0)]);
        engine.handle_event(&mut pool, &KeyEvent::press(2, 1995.0));
        assert_eq!(pool.get(0).unwrap().state(), HitObjectState::Held);
        let rec = engine
            .handle_event(&mut pool, &KeyEvent::release(2, 2510.0))
            .unwrap();
        assert_eq!(rec.part, JudgedPart::Tail);
        assert_eq!(rec.grade, Grade::Marvelous);
        assert_eq!(rec.combo_after, 2);
    }

    #[test]
    fn late_release_is_release_miss_grade() {
        let (mut pool, mut engine) = setup(vec![HitObjectInfo::hold(2, 2000.0, 2500.0)]);
        engine.handle_event(&mut pool, &KeyEvent::press(2, 1995.0));
        let rec = engine
            .handle_event(&mut pool, &KeyEvent::release(2, 2700.0))
            .unwrap();
        assert_eq!(rec.grade, Grade::Okay);
        assert_eq!(rec.error_ms, 200.0);
        assert_eq!(rec.combo_after, 2);
    }

    #[test]
    fn early_release_is_release_miss_grade() {
        let (mut pool, mut engine) = setup(vec![HitObjectInfo::hold(2, 2000.0, 2500.0)]);
        engine.handle_event(&mut pool, &KeyEvent::press(2, 2000.0));
        let rec = engine
            .handle_event(&mut pool, &KeyEvent::release(2, 2100.0))
            .unwrap();
        assert_eq!(rec.grade, Grade::Okay);
        assert_eq!(rec.error_ms, -400.0);
    }

    #[test]
    fn held_past_deadline_is_forced() {
        let (mut pool, mut engine) = setup(vec![HitObjectInfo::hold(2, 2000.0, 2500.0)]);
        engine.handle_event(&mut pool, &KeyEvent::press(2, 2000.0));
        let outer = engine.config().tail_windows.widest();

        engine.check_hold_timeouts(&mut pool, 2500.0 + outer);
        assert_eq!(engine.log().len(), 1);

        engine.check_hold_timeouts(&mut pool, 2500.0 + outer + 1.0);
        let rec = engine.log()[1];
        assert_eq!(rec.grade, Grade::Okay);
        assert_eq!(rec.error_ms, outer);
        assert_eq!(rec.time, 2500.0 + outer);
        // The eventual key-up no longer judges anything.
        assert!(engine.handle_event(&mut pool, &KeyEvent::release(2, 3000.0)).is_none());
        assert_eq!(engine.score().timing().count(), 1);
    }

    #[test]
    fn release_all_judges_held_tails() {
        let (mut pool, mut engine) = setup(vec![
            HitObjectInfo::hold(1, 2000.0, 4000.0),
            HitObjectInfo::tap(2, 2000.0),
        ]);
        engine.handle_event(&mut pool, &KeyEvent::press(1, 2000.0));
        engine.handle_event(&mut pool, &KeyEvent::press(2, 2000.0));

        let records = engine.release_all(&mut pool, 3000.0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].part, JudgedPart::Tail);
        assert_eq!(records[0].grade, Grade::Okay);
        assert_eq!(records[0].error_ms, -1000.0);
        assert!(!engine.is_pressed(1));
        assert!(!engine.is_pressed(2));

        // The real key-up afterwards has nothing left to judge.
        assert!(engine.handle_event(&mut pool, &KeyEvent::release(1, 3995.0)).is_none());
        engine.check_hold_timeouts(&mut pool, 10_000.0);
        assert_eq!(engine.log().len(), 3);
    }

    #[test]
    fn discard_clears_everything() {
        let (mut pool, mut engine) = setup(vec![HitObjectInfo::tap(1, 1000.0)]);
        engine.handle_event(&mut pool, &KeyEvent::press(1, 1000.0));
        engine.discard();
        assert!(engine.log().is_empty());
        assert_eq!(engine.score().total_judged(), 0);
        assert!(!engine.is_pressed(1));
    }
}
