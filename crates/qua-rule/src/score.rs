use serde::{Deserialize, Serialize};

use crate::GRADE_COUNT;
use crate::grade::{Grade, LetterGrade};
use crate::health::HealthBar;

/// Base score per grade, before the mod multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreTable {
    pub marvelous: f64,
    pub perfect: f64,
    pub great: f64,
    pub good: f64,
    pub okay: f64,
    pub miss: f64,
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            marvelous: 100.0,
            perfect: 50.0,
            great: 25.0,
            good: 10.0,
            okay: 5.0,
            miss: 0.0,
        }
    }
}

impl ScoreTable {
    pub fn value(&self, grade: Grade) -> f64 {
        match grade {
            Grade::Marvelous => self.marvelous,
            Grade::Perfect => self.perfect,
            Grade::Great => self.great,
            Grade::Good => self.good,
            Grade::Okay => self.okay,
            Grade::Miss => self.miss,
        }
    }
}

/// What one judgment did to the running state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDelta {
    pub score: f64,
    pub combo_after: u32,
    pub health_delta: f64,
    pub health_after: f64,
}

/// Running mean/variance of signed hit errors (Welford).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    count: u32,
    mean: f64,
    m2: f64,
    early: u32,
    late: u32,
}

impl TimingStats {
    pub fn push(&mut self, error_ms: f64) {
        self.count += 1;
        let delta = error_ms - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (error_ms - self.mean);
        if error_ms < 0.0 {
            self.early += 1;
        } else if error_ms > 0.0 {
            self.late += 1;
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }

    /// Presses before the target.
    pub fn early(&self) -> u32 {
        self.early
    }

    /// Presses after the target.
    pub fn late(&self) -> u32 {
        self.late
    }
}

/// Score, combo, health and statistics accumulated over a play.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreState {
    score: f64,
    combo: u32,
    max_combo: u32,
    counts: [u32; GRADE_COUNT],
    health: HealthBar,
    timing: TimingStats,
}

impl ScoreState {
    /// Apply one judgment.
    ///
    /// `error_ms` is `None` for judgments not caused by an input (autonomous
    /// misses, forced release timeouts); those stay out of the timing stats.
    pub fn apply(
        &mut self,
        grade: Grade,
        error_ms: Option<f64>,
        score: f64,
        health_delta: f64,
    ) -> ScoreDelta {
        self.counts[grade.index()] += 1;
        self.score += score;

        if grade.breaks_combo() {
            self.combo = 0;
        } else {
            self.combo += 1;
            self.max_combo = self.max_combo.max(self.combo);
        }

        if let Some(err) = error_ms {
            self.timing.push(err);
        }

        let applied = self.health.apply(health_delta);
        ScoreDelta {
            score,
            combo_after: self.combo,
            health_delta: applied,
            health_after: self.health.value(),
        }
    }

    /// Health-only change that is not a judgment (ghost penalty).
    pub fn penalize(&mut self, health_delta: f64, break_combo: bool) {
        self.health.apply(health_delta);
        if break_combo {
            self.combo = 0;
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub fn count(&self, grade: Grade) -> u32 {
        self.counts[grade.index()]
    }

    pub fn total_judged(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn health(&self) -> f64 {
        self.health.value()
    }

    pub fn is_health_empty(&self) -> bool {
        self.health.is_empty()
    }

    pub fn timing(&self) -> &TimingStats {
        &self.timing
    }

    /// Weighted accuracy in percent, floored at 0. Zero before any judgment.
    pub fn accuracy(&self) -> f64 {
        let total = self.total_judged();
        if total == 0 {
            return 0.0;
        }
        let weighted: f64 = Grade::ALL
            .iter()
            .map(|g| g.accuracy_weight() * self.count(*g) as f64)
            .sum();
        (weighted / total as f64).max(0.0)
    }

    pub fn letter_grade(&self) -> LetterGrade {
        LetterGrade::from_accuracy(self.accuracy())
    }

    /// True when every judgment so far avoided a Miss.
    pub fn is_full_combo(&self) -> bool {
        self.total_judged() > 0 && self.count(Grade::Miss) == 0
    }
}
