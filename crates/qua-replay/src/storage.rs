//! Replay file storage (gzip-compressed JSON).

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::replay::Replay;

/// File name for a replay inside `dir`.
pub fn replay_path(dir: &Path, replay: &Replay) -> PathBuf {
    let stem = if replay.chart_hash.is_empty() {
        "replay"
    } else {
        replay.chart_hash.as_str()
    };
    dir.join(format!("{stem}_{}.json.gz", replay.date))
}

/// Write a replay with its frames compressed into `keyinput`.
pub fn save_replay(replay: &Replay, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create replay directory: {}", parent.display()))?;
    }

    let mut packed = replay.clone();
    packed.shrink()?;
    let json = serde_json::to_string(&packed).context("Failed to serialize replay")?;

    let file = File::create(path)
        .with_context(|| format!("Failed to create replay file: {}", path.display()))?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder
        .write_all(json.as_bytes())
        .context("Failed to write compressed replay")?;
    encoder.finish().context("Failed to finish compression")?;
    Ok(())
}

/// Read a replay and expand its frames.
pub fn load_replay(path: &Path) -> Result<Replay> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open replay file: {}", path.display()))?;
    let mut json = String::new();
    GzDecoder::new(file)
        .read_to_string(&mut json)
        .context("Failed to decompress replay")?;

    let mut replay: Replay = serde_json::from_str(&json).context("Failed to parse replay")?;
    replay.expand()?;
    Ok(replay)
}
