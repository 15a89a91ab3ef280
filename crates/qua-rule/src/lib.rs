// Judgment windows, health and score tables, modifiers

mod grade;
mod health;
mod judge_config;
mod modifier;
mod score;
pub mod window;

pub use grade::{Grade, LetterGrade};
pub use health::{HealthBar, HealthTable};
pub use judge_config::{GhostPenalty, JudgeConfig};
pub use modifier::{ModSet, Modifier};
pub use score::{ScoreDelta, ScoreState, ScoreTable, TimingStats};
pub use window::{JudgmentWindow, JudgmentWindows};

/// Number of grades, Miss included.
pub const GRADE_COUNT: usize = 6;
