//! Session configuration and the versioned settings handle.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, ensure};
use log::debug;
use serde::{Deserialize, Serialize};

use qua_rule::{JudgeConfig, ModSet, Modifier};

use crate::pool::PoolWindow;

/// How hard the clock pulls toward the audio-reported position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeCorrection {
    /// Fraction of the drift corrected per tick (0..=1).
    pub blend: f64,
    /// Upper bound on a single tick's correction (ms).
    pub max_correction_ms: f64,
}

impl Default for TimeCorrection {
    fn default() -> Self {
        Self {
            blend: 0.1,
            max_correction_ms: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay before the audio starts (ms).
    pub start_delay_ms: f64,
    /// Playback speed multiplier. A speed mod overrides it.
    pub rate: f64,
    /// Items enter the pool this far ahead of the track position.
    pub create_distance: f64,
    /// Items leave the pool this far behind the track position.
    pub recycle_distance: f64,
    /// Minimum number of items seeded into each pool.
    pub initial_pool_size: usize,
    pub time_correction: TimeCorrection,
    pub judge: JudgeConfig,
    pub mods: ModSet,
    pub no_fail: bool,
    /// Time after the last object before the session finishes (ms).
    pub finish_margin_ms: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: 3000.0,
            rate: 1.0,
            create_distance: 1500.0,
            recycle_distance: 1500.0,
            initial_pool_size: 6,
            time_correction: TimeCorrection::default(),
            judge: JudgeConfig::default(),
            mods: ModSet::default(),
            no_fail: false,
            finish_margin_ms: 500.0,
        }
    }
}

impl SessionConfig {
    /// Loads config from a specified path.
    /// Returns default config if the file doesn't exist.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config: {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.start_delay_ms.is_finite() && self.start_delay_ms >= 0.0,
            "start delay must be a non-negative number"
        );
        ensure!(
            self.rate.is_finite() && self.rate > 0.0,
            "rate must be positive"
        );
        ensure!(
            self.create_distance.is_finite() && self.create_distance > 0.0,
            "create distance must be positive"
        );
        ensure!(
            self.recycle_distance.is_finite() && self.recycle_distance >= 0.0,
            "recycle distance must be non-negative"
        );
        ensure!(
            (0.0..=1.0).contains(&self.time_correction.blend),
            "time correction blend must be within 0..=1"
        );
        ensure!(
            self.time_correction.max_correction_ms.is_finite()
                && self.time_correction.max_correction_ms >= 0.0,
            "max time correction must be non-negative"
        );
        ensure!(
            self.finish_margin_ms.is_finite() && self.finish_margin_ms >= 0.0,
            "finish margin must be non-negative"
        );
        self.judge.validate()?;
        self.mods.validate()?;
        Ok(())
    }

    /// Fold mods into the values the clock, pools and engine consume.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;
        let rate = if self.mods.contains(&Modifier::Speed(1.0)) {
            self.mods.rate()
        } else {
            self.rate
        };
        Ok(ResolvedConfig {
            rate,
            window: PoolWindow {
                create_distance: self.create_distance,
                recycle_distance: self.recycle_distance,
            },
            time_correction: self.time_correction,
            judge: self.judge.with_window_scale(self.mods.window_scale()),
            score_multiplier: self.mods.score_multiplier(),
            no_fail: self.no_fail || self.mods.no_fail(),
        })
    }
}

/// Effective per-session values after applying mods.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub rate: f64,
    pub window: PoolWindow,
    pub time_correction: TimeCorrection,
    pub judge: JudgeConfig,
    pub score_multiplier: f64,
    pub no_fail: bool,
}

/// Shared, versioned configuration.
///
/// Writers bump the generation; the tick loop picks the change up at its
/// next tick boundary.
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<Mutex<(u64, SessionConfig)>>,
}

impl SettingsHandle {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new((0, config))),
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).0
    }

    /// Current generation and a copy of the config.
    pub fn snapshot(&self) -> (u64, SessionConfig) {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        (guard.0, guard.1.clone())
    }

    /// Mutate the config and bump the generation.
    pub fn update(&self, f: impl FnOnce(&mut SessionConfig)) -> u64 {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard.1);
        guard.0 += 1;
        debug!("settings generation {}", guard.0);
        guard.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_values() {
        let config = SessionConfig::default();
        assert_eq!(config.start_delay_ms, 3000.0);
        assert_eq!(config.rate, 1.0);
        assert_eq!(config.create_distance, 1500.0);
        assert_eq!(config.recycle_distance, 1500.0);
        assert_eq!(config.initial_pool_size, 6);
        assert_eq!(config.time_correction.blend, 0.1);
        assert_eq!(config.time_correction.max_correction_ms, 8.0);
        assert!(!config.no_fail);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = SessionConfig::load_from(dir.path().join("none.json")).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut config = SessionConfig {
            start_delay_ms: 1000.0,
            no_fail: true,
            ..Default::default()
        };
        config.mods.add(Modifier::Speed(1.25));
        config.save_to(&path).unwrap();

        let loaded = SessionConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{"rate": 1.5, "mods": ["strict"]}"#).unwrap();
        let config = SessionConfig::load_from(&path).unwrap();
        assert_eq!(config.rate, 1.5);
        assert_eq!(config.create_distance, 1500.0);
        assert!(config.mods.contains(&Modifier::Strict));
    }

    #[test]
    fn test_load_rejects_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"rate": -1.0}"#).unwrap();
        assert!(SessionConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_resolve_applies_mods() {
        let mut config = SessionConfig {
            rate: 1.1,
            ..Default::default()
        };
        assert_eq!(config.resolve().unwrap().rate, 1.1);

        config.mods.add(Modifier::Speed(0.8));
        config.mods.add(Modifier::Chill);
        config.mods.add(Modifier::NoFail);
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.rate, 0.8);
        assert!(resolved.no_fail);
        assert!((resolved.judge.tap_windows.widest() - 127.0 * 1.2).abs() < 1e-9);
        assert!((resolved.score_multiplier - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_settings_generation() {
        let handle = SettingsHandle::new(SessionConfig::default());
        assert_eq!(handle.generation(), 0);
        let other = handle.clone();
        assert_eq!(other.update(|c| c.rate = 1.5), 1);
        let (generation, config) = handle.snapshot();
        assert_eq!(generation, 1);
        assert_eq!(config.rate, 1.5);
    }
}
