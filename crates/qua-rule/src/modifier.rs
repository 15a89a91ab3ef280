//! Gameplay modifiers and their effect on a session.

use anyhow::{Result, ensure};
use log::info;
use serde::{Deserialize, Serialize};

pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 2.0;

const STRICT_WINDOW_SCALE: f64 = 0.8;
const CHILL_WINDOW_SCALE: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    /// Playback rate multiplier.
    Speed(f64),
    /// Tighter judgment windows.
    Strict,
    /// Looser judgment windows.
    Chill,
    /// Health reaching zero does not fail the session.
    NoFail,
    /// Input comes from a generated replay.
    Autoplay,
}

impl Modifier {
    /// Amount added to the score multiplier while this mod is active.
    pub fn score_multiplier_addition(&self) -> f64 {
        match self {
            Modifier::Speed(_) => 0.0,
            Modifier::Strict => 0.1,
            Modifier::Chill => -0.5,
            Modifier::NoFail => -0.5,
            Modifier::Autoplay => 0.0,
        }
    }

    fn is_compatible_with(&self, other: &Modifier) -> bool {
        !matches!(
            (self, other),
            (Modifier::Speed(_), Modifier::Speed(_))
                | (Modifier::Strict, Modifier::Chill)
                | (Modifier::Chill, Modifier::Strict)
        ) && std::mem::discriminant(self) != std::mem::discriminant(other)
    }
}

/// An ordered set of mutually compatible modifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModSet(Vec<Modifier>);

impl ModSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mod, dropping any already-active mods it is incompatible with.
    pub fn add(&mut self, modifier: Modifier) {
        self.0.retain(|m| m.is_compatible_with(&modifier));
        self.0.push(modifier);
        info!("mods now {:?}", self.0);
    }

    pub fn remove_speed(&mut self) {
        self.0.retain(|m| !matches!(m, Modifier::Speed(_)));
    }

    pub fn contains(&self, modifier: &Modifier) -> bool {
        self.0.iter().any(|m| match (m, modifier) {
            (Modifier::Speed(_), Modifier::Speed(_)) => true,
            (a, b) => a == b,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Modifier> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reject out-of-range speeds and incompatible pairs.
    pub fn validate(&self) -> Result<()> {
        for (i, m) in self.0.iter().enumerate() {
            if let Modifier::Speed(rate) = m {
                ensure!(
                    (MIN_SPEED..=MAX_SPEED).contains(rate),
                    "speed {rate} outside {MIN_SPEED}..={MAX_SPEED}"
                );
            }
            for other in &self.0[i + 1..] {
                ensure!(
                    m.is_compatible_with(other),
                    "mods {m:?} and {other:?} cannot be combined"
                );
            }
        }
        Ok(())
    }

    /// Playback rate; 1.0 without a speed mod.
    pub fn rate(&self) -> f64 {
        self.0
            .iter()
            .find_map(|m| match m {
                Modifier::Speed(r) => Some(*r),
                _ => None,
            })
            .unwrap_or(1.0)
    }

    /// Factor applied to every judgment window.
    pub fn window_scale(&self) -> f64 {
        self.0.iter().fold(1.0, |acc, m| match m {
            Modifier::Strict => acc * STRICT_WINDOW_SCALE,
            Modifier::Chill => acc * CHILL_WINDOW_SCALE,
            _ => acc,
        })
    }

    /// `1 + Σ additions`, never negative.
    pub fn score_multiplier(&self) -> f64 {
        let sum: f64 = self.0.iter().map(Modifier::score_multiplier_addition).sum();
        (1.0 + sum).max(0.0)
    }

    pub fn no_fail(&self) -> bool {
        self.contains(&Modifier::NoFail)
    }

    pub fn autoplay(&self) -> bool {
        self.contains(&Modifier::Autoplay)
    }
}

impl FromIterator<Modifier> for ModSet {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        let mut set = ModSet::new();
        for m in iter {
            set.add(m);
        }
        set
    }
}
