// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "depthmesh")]
#[command(about = "Depth-grid mesh reconstruction for Kinect-class sensors")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Path to a config file (default: user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect a capture file or directory
    Info {
        /// Capture path (depth PNG/bin file, or a capture directory)
        capture: PathBuf,
    },

    /// Reconstruct a mesh from a capture and export scene artifacts
    Reconstruct {
        /// Capture path (depth PNG/bin file, or a capture directory)
        capture: PathBuf,

        /// Output directory (default: ~/Pictures/depthmesh)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Reconstruct the tracked user's mesh instead of the scene
        #[arg(short, long)]
        player: Option<usize>,

        /// Treat raw depth samples as 16-bit disparity instead of millimeters
        #[arg(long)]
        disparity: bool,
    },

    /// Continuously replay a capture and rebuild the mesh until Ctrl-C
    Watch {
        /// Capture directory with one or more depth frames
        capture: PathBuf,

        /// Seconds between replayed frames
        #[arg(short, long, default_value = "0.1")]
        interval: f32,

        /// Export scene artifacts for the final mesh on exit
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=depthmesh=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { capture } => cli::info(&capture, &config),
        Commands::Reconstruct {
            capture,
            output,
            player,
            disparity,
        } => cli::reconstruct(&capture, output, player, disparity, &config),
        Commands::Watch {
            capture,
            interval,
            output,
        } => cli::watch(&capture, interval, output, &config),
    }
}
