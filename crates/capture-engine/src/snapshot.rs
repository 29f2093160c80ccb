//! One-shot screenshot capture.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use capturescreen_capture_model::{Artifact, ArtifactHandle, Quality};
use capturescreen_common::error::{CaptureError, CaptureResult};
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::media::{self, AcquiredStreams, DisplayConstraints, MediaDevices, TrackDescriptor};
use crate::slot::CaptureSlot;

/// Delay between starting playback and grabbing a frame, so at least one
/// frame has been decoded.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Source resolution reported by a video sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A decoded frame in tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// An offscreen player for a display stream.
#[async_trait]
pub trait VideoSink: Send {
    /// Wait until the source resolution is known.
    async fn load_metadata(&mut self) -> CaptureResult<FrameSize>;

    fn play(&mut self) -> CaptureResult<()>;

    /// The most recent decoded frame, if any.
    fn current_frame(&mut self) -> CaptureResult<Option<RgbaFrame>>;
}

/// Attaches video sinks to acquired display tracks.
pub trait VideoSinkFactory: Send + Sync {
    fn attach(&self, tracks: &[TrackDescriptor]) -> CaptureResult<Box<dyn VideoSink>>;
}

/// Screenshot state machine. At most one capture runs at a time.
pub struct SnapshotCapture {
    devices: Arc<dyn MediaDevices>,
    sinks: Arc<dyn VideoSinkFactory>,
    slot: CaptureSlot,
    settle_delay: Duration,
    artifact: Mutex<Option<Arc<Artifact>>>,
}

impl SnapshotCapture {
    pub fn new(devices: Arc<dyn MediaDevices>, sinks: Arc<dyn VideoSinkFactory>) -> Self {
        Self {
            devices,
            sinks,
            slot: CaptureSlot::new(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            artifact: Mutex::new(None),
        }
    }

    /// Share a capture slot with a recording session.
    pub fn with_slot(mut self, slot: CaptureSlot) -> Self {
        self.slot = slot;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn is_capturing(&self) -> bool {
        self.slot.is_busy()
    }

    /// Handle to the last successful screenshot.
    pub fn artifact(&self) -> Option<ArtifactHandle> {
        self.lock_artifact().as_ref().map(ArtifactHandle::new)
    }

    /// Capture one frame of a user-selected display as a PNG.
    ///
    /// The display stream is released whether or not the capture succeeds.
    /// On failure the previous screenshot is kept.
    pub async fn capture(&self, quality: Quality) -> CaptureResult<ArtifactHandle> {
        let _slot = self
            .slot
            .try_claim()
            .ok_or(CaptureError::CaptureInProgress)?;

        let constraints = DisplayConstraints::for_snapshot(quality);
        tracing::info!(?constraints, "Taking screenshot");
        let mut streams = media::acquire_display(self.devices.as_ref(), &constraints).await?;

        let grabbed = self.grab_png(&streams).await;
        streams.release();

        let png = match grabbed {
            Ok(png) => png,
            Err(e) => {
                tracing::warn!(error = %e, "Screenshot failed");
                return Err(e);
            }
        };

        let artifact = Arc::new(Artifact::screenshot(png));
        let handle = ArtifactHandle::new(&artifact);
        tracing::info!(bytes = artifact.len(), "Screenshot ready");
        *self.lock_artifact() = Some(artifact);
        Ok(handle)
    }

    async fn grab_png(&self, streams: &AcquiredStreams) -> CaptureResult<Vec<u8>> {
        let mut sink = self.sinks.attach(&streams.combined())?;

        let size = sink.load_metadata().await?;
        if size.is_empty() {
            return Err(CaptureError::frame_unavailable(format!(
                "source reported {}x{}",
                size.width, size.height
            )));
        }

        sink.play()?;
        tokio::time::sleep(self.settle_delay).await;

        let frame = sink
            .current_frame()?
            .ok_or_else(|| CaptureError::frame_unavailable("no decoded frame available"))?;
        let surface = draw_frame(size, frame)?;
        encode_png(surface)
    }

    fn lock_artifact(&self) -> std::sync::MutexGuard<'_, Option<Arc<Artifact>>> {
        self.artifact
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Draw `frame` at the origin of a transparent surface sized to the source.
pub fn draw_frame(size: FrameSize, frame: RgbaFrame) -> CaptureResult<RgbaImage> {
    if frame.data.is_empty() {
        return Err(CaptureError::frame_unavailable("source frame is blank"));
    }
    let (width, height) = (frame.width, frame.height);
    let image = RgbaImage::from_raw(width, height, frame.data).ok_or_else(|| {
        CaptureError::frame_unavailable(format!("frame buffer does not hold {width}x{height} RGBA"))
    })?;

    let mut surface = RgbaImage::new(size.width, size.height);
    image::imageops::replace(&mut surface, &image, 0, 0);
    Ok(surface)
}

/// Encode a raster surface as PNG.
pub fn encode_png(surface: RgbaImage) -> CaptureResult<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(surface)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| CaptureError::encoder(format!("PNG encoding failed: {e}")))?;
    Ok(bytes)
}
