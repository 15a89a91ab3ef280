use serde::{Deserialize, Serialize};

use crate::grade::Grade;

pub const HEALTH_MAX: f64 = 100.0;
pub const HEALTH_MIN: f64 = 0.0;

/// Health change per grade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthTable {
    pub marvelous: f64,
    pub perfect: f64,
    pub great: f64,
    pub good: f64,
    pub okay: f64,
    pub miss: f64,
}

impl Default for HealthTable {
    fn default() -> Self {
        Self {
            marvelous: 0.5,
            perfect: 0.4,
            great: 0.2,
            good: -3.0,
            okay: -4.5,
            miss: -6.0,
        }
    }
}

impl HealthTable {
    pub fn delta(&self, grade: Grade) -> f64 {
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

/// Health bar clamped to `[0, 100]`, starting full.
///
/// Unlike a groove gauge the bar may recover after dipping; failure is
/// decided by the session when the value reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthBar {
    value: f64,
}

impl Default for HealthBar {
    fn default() -> Self {
        Self { value: HEALTH_MAX }
    }
}

impl HealthBar {
    /// Apply a change and return the delta actually applied after clamping.
    pub fn apply(&mut self, delta: f64) -> f64 {
        let before = self.value;
        self.value = (self.value + delta).clamp(HEALTH_MIN, HEALTH_MAX);
        self.value - before
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value <= HEALTH_MIN
    }
}
