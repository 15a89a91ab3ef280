// qua: headless driver for the gameplay core.

mod cli;

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use clap::Parser;
use log::{info, warn};

use qua_model::{ChartData, ChartTimeline};
use qua_play::persist::{self, FileSink, PersistStatus};
use qua_play::{GameplaySession, SessionConfig, SessionResult, SettingsHandle, SilentTrack};
use qua_replay::{generate_autoplay, storage};
use qua_rule::Grade;

use cli::{Args, Command};

/// Time past the chart end after which a simulation is abandoned (ms).
const SIMULATION_SLACK_MS: f64 = 60_000.0;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match args.command {
        Command::Simulate {
            chart,
            replay,
            config,
            log_out,
            tick_ms,
            save_dir,
            json,
        } => {
            let config = match config {
                Some(path) => SessionConfig::load_from(&path)?,
                None => SessionConfig::default(),
            };
            let result = simulate(&chart, &replay, config, tick_ms)?;
            print_summary(&result, json)?;

            if let Some(path) = log_out {
                let content = serde_json::to_string_pretty(&result.log)?;
                fs::write(&path, content)
                    .with_context(|| format!("Failed to write log: {}", path.display()))?;
                info!("wrote {} judgments to {}", result.log.len(), path.display());
            }
            if let Some(dir) = save_dir {
                save_result(&dir, result);
            }
        }
        Command::Autoplay { chart, out } => {
            let timeline = load_chart(&chart)?;
            let mut replay = generate_autoplay(&timeline);
            replay.chart_hash = chart
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            storage::save_replay(&replay, &out)?;
            info!(
                "wrote autoplay replay ({} frames) to {}",
                replay.frames.len(),
                out.display()
            );
        }
        Command::Dump { replay } => {
            let replay = storage::load_replay(&replay)?;
            print!("{}", replay.dump());
        }
    }
    Ok(())
}

fn load_chart(path: &Path) -> Result<ChartTimeline> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read chart: {}", path.display()))?;
    let data: ChartData = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse chart: {}", path.display()))?;
    ChartTimeline::new(data).with_context(|| format!("Invalid chart: {}", path.display()))
}

fn simulate(
    chart: &Path,
    replay: &Path,
    config: SessionConfig,
    tick_ms: f64,
) -> Result<SessionResult> {
    ensure!(
        tick_ms.is_finite() && tick_ms > 0.0,
        "tick must be a positive number of milliseconds"
    );
    let timeline = load_chart(chart)?;
    let replay = storage::load_replay(replay)?;
    let deadline = timeline.length().max(replay.end_time().unwrap_or(0.0)) + SIMULATION_SLACK_MS;

    let mut session = GameplaySession::replay(
        timeline,
        SettingsHandle::new(config),
        Box::new(SilentTrack),
        &replay,
    )?;
    while !session.is_done() {
        session.tick(tick_ms);
        if session.time() > deadline {
            bail!("simulation did not finish by {deadline:.0}ms");
        }
    }
    Ok(session.into_result())
}

fn print_summary(result: &SessionResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&result.summary)?);
        return Ok(());
    }

    let summary = &result.summary;
    println!("Result:    {:?}", result.phase);
    println!("Score:     {:.0}", summary.score);
    println!("Accuracy:  {:.2}%", summary.accuracy);
    if let Some(letter) = summary.letter {
        println!("Grade:     {letter:?}");
    }
    println!("Max combo: {}", summary.max_combo);
    for grade in Grade::ALL {
        println!("  {:<10} {}", format!("{grade:?}"), summary.counts[grade.index()]);
    }
    let timing = result.score.timing();
    println!(
        "Timing:    mean {:+.2}ms, sd {:.2}ms ({} early / {} late)",
        timing.mean(),
        timing.std_dev(),
        timing.early(),
        timing.late()
    );
    Ok(())
}

/// Persist in the background and wait for it before the process exits.
fn save_result(dir: &Path, result: SessionResult) {
    let handle = persist::spawn(FileSink::new(dir), result);
    while !handle.is_complete() {
        thread::sleep(Duration::from_millis(10));
    }
    match handle.status() {
        PersistStatus::Done => info!("saved result to {}", dir.display()),
        PersistStatus::Failed(e) => warn!("result not saved: {e}"),
        PersistStatus::Pending => {}
    }
}
