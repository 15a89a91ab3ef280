use serde::{Deserialize, Serialize};

use crate::GRADE_COUNT;

/// Judgment grade, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    Marvelous,
    Perfect,
    Great,
    Good,
    Okay,
    Miss,
}

impl Grade {
    pub const ALL: [Grade; GRADE_COUNT] = [
        Grade::Marvelous,
        Grade::Perfect,
        Grade::Great,
        Grade::Good,
        Grade::Okay,
        Grade::Miss,
    ];

    /// Index into per-grade tables (0 = Marvelous .. 5 = Miss).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether this grade resets the combo.
    pub fn breaks_combo(self) -> bool {
        self == Grade::Miss
    }

    /// Accuracy weight in percent.
    pub fn accuracy_weight(self) -> f64 {
        match self {
            Grade::Marvelous => 100.0,
            Grade::Perfect => 98.25,
            Grade::Great => 65.0,
            Grade::Good => 25.0,
            Grade::Okay => -100.0,
            Grade::Miss => -50.0,
        }
    }
}

/// Letter grade derived from accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    D,
    C,
    B,
    A,
    S,
    SS,
    X,
}

impl LetterGrade {
    pub fn from_accuracy(accuracy: f64) -> Self {
        match accuracy {
            a if a >= 100.0 => LetterGrade::X,
            a if a >= 99.0 => LetterGrade::SS,
            a if a >= 95.0 => LetterGrade::S,
            a if a >= 90.0 => LetterGrade::A,
            a if a >= 80.0 => LetterGrade::B,
            a if a >= 70.0 => LetterGrade::C,
            _ => LetterGrade::D,
        }
    }
}
