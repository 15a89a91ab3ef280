//! Fire-and-forget score/replay persistence after a session ends.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use log::{error, info};

use qua_replay::{Replay, storage};

use crate::session::SessionResult;

/// Destination for finished sessions.
pub trait ScoreSink: Send + 'static {
    fn save_score(&mut self, result: &SessionResult) -> Result<()>;

    fn save_replay(&mut self, replay: &Replay) -> Result<()>;
}

/// Writes results as JSON and replays as gzip files under one directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ScoreSink for FileSink {
    fn save_score(&mut self, result: &SessionResult) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self
            .dir
            .join(format!("score_{}.json", chrono::Utc::now().timestamp_millis()));
        let json = serde_json::to_string_pretty(result)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write score: {}", path.display()))?;
        Ok(())
    }

    fn save_replay(&mut self, replay: &Replay) -> Result<()> {
        let path = storage::replay_path(&self.dir, replay);
        storage::save_replay(replay, &path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PersistStatus {
    #[default]
    Pending,
    Done,
    Failed(String),
}

/// Observes a background write. Dropping it does not cancel the write.
#[derive(Debug, Clone)]
pub struct PersistHandle {
    status: Arc<Mutex<PersistStatus>>,
}

impl PersistHandle {
    pub fn status(&self) -> PersistStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_complete(&self) -> bool {
        !matches!(self.status(), PersistStatus::Pending)
    }
}

/// Write `result` (and its replay, if any) on a detached thread.
pub fn spawn<S: ScoreSink>(mut sink: S, result: SessionResult) -> PersistHandle {
    let status = Arc::new(Mutex::new(PersistStatus::Pending));
    let shared = status.clone();

    std::thread::spawn(move || {
        let outcome = write_all(&mut sink, &result);
        let next = match outcome {
            Ok(()) => {
                info!("saved session result ({} judgments)", result.log.len());
                PersistStatus::Done
            }
            Err(e) => {
                error!("failed to save session result: {e:#}");
                PersistStatus::Failed(format!("{e:#}"))
            }
        };
        *shared.lock().unwrap_or_else(PoisonError::into_inner) = next;
    });

    PersistHandle { status }
}

fn write_all<S: ScoreSink>(sink: &mut S, result: &SessionResult) -> Result<()> {
    sink.save_score(result).context("score write")?;
    if let Some(replay) = &result.replay {
        sink.save_replay(replay).context("replay write")?;
    }
    Ok(())
}
