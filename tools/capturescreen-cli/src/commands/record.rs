//! Record the screen until Ctrl+C, auto-stop, or the share ending.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use capturescreen_capture_engine::backend::{GstEncoderFactory, GstMediaDevices};
use capturescreen_capture_engine::{
    ArtifactExporter, CaptureSession, DirectoryDownloads, SessionState,
};
use capturescreen_capture_model::CaptureConfig;
use capturescreen_common::clock::format_elapsed;

pub async fn run(capture: CaptureConfig, output: PathBuf, json: bool) -> anyhow::Result<()> {

    println!("Starting screen recording");
    println!("  Quality: {}", capture.quality);
    println!("  Microphone: {}", capture.audio_enabled);
    match capture.auto_stop_secs {
        0 => println!("  Auto-stop: off"),
        secs => println!("  Auto-stop: {}", format_elapsed(u64::from(secs))),
    }
    println!("  Output: {}", output.display());
    println!();

    let mut session = CaptureSession::new(
        Arc::new(GstMediaDevices::new()),
        Arc::new(GstEncoderFactory),
    );
    if let Err(e) = session.start(capture).await {
        if e.is_user_declined() {
            println!("Recording cancelled: {e}");
            return Ok(());
        }
        return Err(e.into());
    }

    println!("Recording. Press Ctrl+C to stop...");
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut shown = None;
    while session.state() == SessionState::Recording {
        let elapsed = session.elapsed_secs();
        if shown != Some(elapsed) {
            shown = Some(elapsed);
            print!("\r  {}", format_elapsed(elapsed));
            std::io::stdout().flush()?;
        }

        let interrupted = tokio::select! {
            res = &mut ctrl_c => {
                res?;
                true
            }
            res = session.next_event() => {
                res?;
                false
            }
        };
        if interrupted {
            session.stop()?;
        }
    }
    println!();

    println!("Finalizing...");
    let handle = session.wait_for_artifact().await?;

    if let Some(summary) = session.summary() {
        if json {
            println!("{}", serde_json::to_string_pretty(summary)?);
        } else {
            println!(
                "Recorded {} ({:?} stop, {} bytes)",
                format_elapsed(summary.elapsed_at_stop),
                summary.stop_reason,
                summary.bytes
            );
        }
    }

    let mut exporter = ArtifactExporter::with_system_clock(DirectoryDownloads::new(output));
    match exporter.export(handle.as_ref())? {
        Some(path) => println!("Recording saved to: {}", path.display()),
        None => println!("Nothing was recorded."),
    }

    Ok(())
}
