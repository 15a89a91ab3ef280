//! CLI argument definitions for qua.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "qua")]
#[command(about = "Headless rhythm game core: replay simulation and autoplay", version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a replay against a chart and print the result
    Simulate {
        /// Chart data (JSON)
        #[arg(long, value_name = "FILE")]
        chart: PathBuf,
        /// Replay file (.json.gz)
        #[arg(long, value_name = "FILE")]
        replay: PathBuf,
        /// Session config (JSON); defaults when missing
        #[arg(long, value_name = "FILE", env = "QUA_CONFIG")]
        config: Option<PathBuf>,
        /// Write the judgment log here (JSON)
        #[arg(long, value_name = "FILE")]
        log_out: Option<PathBuf>,
        /// Simulated frame time in milliseconds
        #[arg(long, default_value_t = 1000.0 / 60.0)]
        tick_ms: f64,
        /// Also save the score to this directory
        #[arg(long, value_name = "DIR")]
        save_dir: Option<PathBuf>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate an autoplay replay for a chart
    Autoplay {
        /// Chart data (JSON)
        #[arg(long, value_name = "FILE")]
        chart: PathBuf,
        /// Output replay file (.json.gz)
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Print a replay's frames one per line
    Dump {
        /// Replay file (.json.gz)
        #[arg(long, value_name = "FILE")]
        replay: PathBuf,
    },
}
