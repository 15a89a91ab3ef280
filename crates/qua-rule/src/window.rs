//! Judgment window tables.

use anyhow::{Result, bail, ensure};
use serde::{Deserialize, Serialize};

use crate::grade::Grade;

/// One row of a window table: errors within `±tolerance_ms` earn `grade`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JudgmentWindow {
    pub grade: Grade,
    pub tolerance_ms: f64,
}

/// Ordered window table, tightest first.
///
/// An error beyond the widest tolerance is outside the table; whether that is
/// a ghost press or a miss is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JudgmentWindows(Vec<JudgmentWindow>);

impl JudgmentWindows {
    /// Build and validate a table.
    pub fn new(windows: Vec<JudgmentWindow>) -> Result<Self> {
        let table = Self(windows);
        table.validate()?;
        Ok(table)
    }

    /// Default tap windows: 18 / 43 / 76 / 106 / 127 ms.
    pub fn standard_tap() -> Self {
        Self(vec![
            JudgmentWindow {
                grade: Grade::Marvelous,
                tolerance_ms: 18.0,
            },
            JudgmentWindow {
                grade: Grade::Perfect,
                tolerance_ms: 43.0,
            },
            JudgmentWindow {
                grade: Grade::Great,
                tolerance_ms: 76.0,
            },
            JudgmentWindow {
                grade: Grade::Good,
                tolerance_ms: 106.0,
            },
            JudgmentWindow {
                grade: Grade::Okay,
                tolerance_ms: 127.0,
            },
        ])
    }

    /// Default release windows: tap windows widened by half.
    pub fn standard_tail() -> Self {
        Self::standard_tap().scaled(1.5)
    }

    /// Check the table is non-empty with finite, strictly increasing tolerances.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.0.is_empty(), "judgment window table is empty");
        let mut prev = 0.0;
        for w in &self.0 {
            if w.grade == Grade::Miss {
                bail!("Miss cannot have a judgment window");
            }
            if !w.tolerance_ms.is_finite() || w.tolerance_ms <= prev {
                bail!(
                    "window for {:?} ({} ms) must be finite and wider than {} ms",
                    w.grade,
                    w.tolerance_ms,
                    prev
                );
            }
            prev = w.tolerance_ms;
        }
        Ok(())
    }

    /// Grade for a signed timing error, or `None` when outside every window.
    pub fn classify(&self, error_ms: f64) -> Option<Grade> {
        let abs = error_ms.abs();
        self.0
            .iter()
            .find(|w| abs <= w.tolerance_ms)
            .map(|w| w.grade)
    }

    /// Outermost tolerance; errors past it are misses.
    pub fn widest(&self) -> f64 {
        self.0.last().map_or(0.0, |w| w.tolerance_ms)
    }

    /// Copy with every tolerance multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self(
            self.0
                .iter()
                .map(|w| JudgmentWindow {
                    grade: w.grade,
                    tolerance_ms: w.tolerance_ms * factor,
                })
                .collect(),
        )
    }

    pub fn windows(&self) -> &[JudgmentWindow] {
        &self.0
    }
}

impl Default for JudgmentWindows {
    fn default() -> Self {
        Self::standard_tap()
    }
}
