//! Capture a single screenshot.

use std::path::PathBuf;
use std::sync::Arc;

use capturescreen_capture_engine::backend::{GstFrameGrabber, GstMediaDevices};
use capturescreen_capture_engine::{ArtifactExporter, DirectoryDownloads, SnapshotCapture};
use capturescreen_capture_model::Quality;

pub async fn run(quality: Quality, output: PathBuf) -> anyhow::Result<()> {
    println!("Select a screen or window to capture ({quality})...");

    let snapshot = SnapshotCapture::new(Arc::new(GstMediaDevices::new()), Arc::new(GstFrameGrabber));
    let handle = match snapshot.capture(quality).await {
        Ok(handle) => handle,
        Err(e) if e.is_user_declined() => {
            println!("Screenshot cancelled: {e}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut exporter = ArtifactExporter::with_system_clock(DirectoryDownloads::new(output));
    if let Some(path) = exporter.export(Some(&handle))? {
        println!("Screenshot saved to: {}", path.display());
    }
    Ok(())
}
