// SPDX-License-Identifier: GPL-3.0-only

use camera_session::VideoQuality;
use camera_session::backends::CameraPosition;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-session")]
#[command(about = "Drive a camera session from the command line")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Settings file (overrides CAMERA_SESSION_CONFIG)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Camera position to use
    #[arg(short, long, global = true, default_value = "back", value_parser = parse_position)]
    position: CameraPosition,

    /// Explicit device id (from 'camera-session list')
    #[arg(short, long, global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Take a photo
    Photo {
        /// JPEG quality (1-100)
        #[arg(short, long, default_value = "85")]
        quality: u8,

        /// Output file path (default: ~/Pictures/Camera/photo_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Flash mode (off, on, auto)
        #[arg(short, long, default_value = "off", value_parser = parse_flash)]
        flash: camera_session::FlashMode,
    },

    /// Grab a frame from the live preview
    Sample {
        #[arg(short, long, default_value = "85")]
        quality: u8,

        /// Output file path (default: ~/Pictures/Camera/sample_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record a video
    Video {
        /// Recording duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Output file path (default: ~/Videos/Camera/video_TIMESTAMP.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Enable audio recording
        #[arg(short, long)]
        audio: bool,

        /// Quality (low, medium, high, max)
        #[arg(short, long, default_value = "high")]
        quality: VideoQuality,
    },

    /// Print barcodes seen by the camera until Ctrl+C
    Scan {
        /// Stop after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
}

fn parse_position(value: &str) -> Result<CameraPosition, String> {
    match value {
        "back" | "front" | "external" => Ok(CameraPosition::from_location(value)),
        other => Err(format!("unknown camera position '{}'", other)),
    }
}

fn parse_flash(value: &str) -> Result<camera_session::FlashMode, String> {
    use camera_session::FlashMode;
    match value {
        "off" => Ok(FlashMode::Off),
        "on" => Ok(FlashMode::On),
        "auto" => Ok(FlashMode::Auto),
        other => Err(format!("unknown flash mode '{}'", other)),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_session=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    tracing::info!(version = env!("GIT_VERSION"), "camera-session starting");

    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => camera_session::Settings::load_from(path),
        None => camera_session::Settings::load(),
    };
    let selection = cli::Selection {
        position: cli.position,
        device_id: cli.device,
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Commands::List => cli::list_cameras(settings).await,
            Commands::Photo {
                quality,
                output,
                flash,
            } => cli::take_photo(settings, selection, quality, flash, output).await,
            Commands::Sample { quality, output } => {
                cli::take_sample(settings, selection, quality, output).await
            }
            Commands::Video {
                duration,
                output,
                audio,
                quality,
            } => cli::record_video(settings, selection, duration, output, audio, quality).await,
            Commands::Scan { timeout } => cli::scan_barcodes(settings, selection, timeout).await,
        }
    })
}
