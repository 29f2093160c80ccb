//! CaptureScreen CLI: screen recording and screenshots from the terminal.
//!
//! Usage:
//!   capturescreen record [OPTIONS]       Record until Ctrl+C or auto-stop
//!   capturescreen screenshot [OPTIONS]   Capture one PNG
//!   capturescreen check                  Check system capabilities

use std::path::PathBuf;

use capturescreen_capture_model::{CaptureConfig, CaptureOverrides, Quality};
use capturescreen_common::config::AppConfig;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "capturescreen",
    about = "Screen recording and screenshots to WebM and PNG",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the screen to a WebM file
    Record {
        /// Quality tier: high (1080p, 30 fps) or medium (720p, 15 fps)
        #[arg(short, long)]
        quality: Option<Quality>,

        /// Also record the microphone
        #[arg(long, conflicts_with = "no_audio")]
        audio: bool,

        /// Never record the microphone, even if the config enables it
        #[arg(long)]
        no_audio: bool,

        /// Stop automatically after this many seconds (0-300, step 10; 0 disables)
        #[arg(long)]
        auto_stop: Option<u32>,

        /// Output directory (defaults to the configured downloads directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the recording summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Capture a single screenshot as PNG
    Screenshot {
        /// Quality tier: high or medium
        #[arg(short, long)]
        quality: Option<Quality>,

        /// Output directory (defaults to the configured downloads directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load();

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    capturescreen_common::logging::init_logging(&config.logging);
    tracing::debug!(
        path = %capturescreen_common::config::config_file_path().display(),
        ?config,
        "Loaded configuration"
    );

    match cli.command {
        Commands::Record {
            quality,
            audio,
            no_audio,
            auto_stop,
            output,
            json,
        } => {
            let overrides = CaptureOverrides {
                quality,
                audio_enabled: (audio || no_audio).then_some(audio),
                auto_stop_secs: auto_stop,
            };
            let capture = CaptureConfig::from_defaults(&config.capture, overrides)?;
            let output = output.unwrap_or_else(|| config.downloads_dir.clone());
            commands::record::run(capture, output, json).await
        }
        Commands::Screenshot { quality, output } => {
            let quality = match quality {
                Some(quality) => quality,
                None => config.capture.quality.parse()?,
            };
            let output = output.unwrap_or_else(|| config.downloads_dir.clone());
            commands::screenshot::run(quality, output).await
        }
        Commands::Check => commands::check::run(),
    }
}

