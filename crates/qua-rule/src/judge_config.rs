use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::grade::Grade;
use crate::health::HealthTable;
use crate::score::ScoreTable;
use crate::window::JudgmentWindows;

/// What a press with no eligible object does.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GhostPenalty {
    /// Ignored entirely.
    #[default]
    Ignore,
    /// Health change (and optionally a combo break). Never logged as a judgment.
    Penalty { health: f64, break_combo: bool },
}

/// Complete judging rules for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Windows for presses (taps and hold heads).
    pub tap_windows: JudgmentWindows,
    /// Windows for hold releases.
    pub tail_windows: JudgmentWindows,
    /// Grade for a release outside the tail window or never released.
    pub release_miss_grade: Grade,
    pub health: HealthTable,
    pub score: ScoreTable,
    pub ghost_penalty: GhostPenalty,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            tap_windows: JudgmentWindows::standard_tap(),
            tail_windows: JudgmentWindows::standard_tail(),
            release_miss_grade: Grade::Okay,
            health: HealthTable::default(),
            score: ScoreTable::default(),
            ghost_penalty: GhostPenalty::default(),
        }
    }
}

impl JudgeConfig {
    pub fn validate(&self) -> Result<()> {
        self.tap_windows.validate()?;
        self.tail_windows.validate()?;
        ensure!(
            self.release_miss_grade != Grade::Miss,
            "release miss grade must be better than Miss"
        );
        if let GhostPenalty::Penalty { health, .. } = self.ghost_penalty {
            ensure!(health.is_finite(), "ghost penalty must be finite");
        }
        Ok(())
    }

    /// Copy with both window tables scaled by `factor`.
    pub fn with_window_scale(&self, factor: f64) -> Self {
        Self {
            tap_windows: self.tap_windows.scaled(factor),
            tail_windows: self.tail_windows.scaled(factor),
            ..self.clone()
        }
    }
}
