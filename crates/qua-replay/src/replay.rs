use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use qua_rule::{GRADE_COUNT, Grade, LetterGrade, ModSet, ScoreState};

use crate::codec;
use crate::cursor::ReplayCursor;
use crate::frame::InputFrame;

/// Final result stored alongside the frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub score: f64,
    pub accuracy: f64,
    pub max_combo: u32,
    /// Counts indexed by [`Grade::index`].
    pub counts: [u32; GRADE_COUNT],
    pub letter: Option<LetterGrade>,
    pub failed: bool,
}

impl ReplaySummary {
    pub fn from_score(score: &ScoreState, failed: bool) -> Self {
        let mut counts = [0; GRADE_COUNT];
        for grade in Grade::ALL {
            counts[grade.index()] = score.count(grade);
        }
        Self {
            score: score.score(),
            accuracy: score.accuracy(),
            max_combo: score.max_combo(),
            counts,
            letter: Some(score.letter_grade()),
            failed,
        }
    }
}

/// A recorded play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    #[serde(default)]
    pub player: String,
    /// Identifier of the chart this replay belongs to.
    #[serde(default)]
    pub chart_hash: String,
    /// Play date (unix timestamp, seconds).
    #[serde(default)]
    pub date: i64,
    pub key_count: usize,
    #[serde(default)]
    pub mods: ModSet,
    /// Frames (populated after `expand()`).
    #[serde(default)]
    pub frames: Vec<InputFrame>,
    /// Compressed frames, populated by `shrink()`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyinput: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ReplaySummary>,
}

impl Replay {
    pub fn new(key_count: usize, mods: ModSet, frames: Vec<InputFrame>) -> Self {
        Self {
            player: String::new(),
            chart_hash: String::new(),
            date: chrono::Utc::now().timestamp(),
            key_count,
            mods,
            frames,
            keyinput: None,
            summary: None,
        }
    }

    /// Move `frames` into the compressed `keyinput` field.
    pub fn shrink(&mut self) -> Result<()> {
        if self.frames.is_empty() {
            return Ok(());
        }
        self.keyinput = Some(codec::shrink(&self.frames)?);
        self.frames.clear();
        Ok(())
    }

    /// Restore `frames` from `keyinput`, if present.
    pub fn expand(&mut self) -> Result<()> {
        if let Some(encoded) = self.keyinput.take() {
            self.frames = codec::expand(&encoded).context("invalid replay key input")?;
        }
        Ok(())
    }

    /// Cursor over this replay's frames, validating their ordering.
    pub fn cursor(&self) -> Result<ReplayCursor> {
        ReplayCursor::new(self.frames.clone(), self.key_count)
    }

    /// Time of the last frame.
    pub fn end_time(&self) -> Option<f64> {
        self.frames.last().map(|f| f.time)
    }

    /// Debug listing of the frames.
    pub fn dump(&self) -> String {
        codec::dump_frames(&self.frames, self.key_count)
    }
}
