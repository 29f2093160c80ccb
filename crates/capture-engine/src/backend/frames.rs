//! Offscreen RGBA frame grabbing for screenshots.

use async_trait::async_trait;
use capturescreen_common::error::{CaptureError, CaptureResult};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;

use super::init_gstreamer;
use crate::media::{TrackDescriptor, TrackKind};
use crate::snapshot::{FrameSize, RgbaFrame, VideoSink, VideoSinkFactory};

const APPSINK_NAME: &str = "frames";

/// Live sources can take a while to negotiate their first buffer.
const FIRST_FRAME_TIMEOUT_SECS: u64 = 5;

const FRAME_POLL_MS: u64 = 200;

/// Attaches an RGBA `appsink` to a display track.
#[derive(Debug, Clone, Copy, Default)]
pub struct GstFrameGrabber;

impl VideoSinkFactory for GstFrameGrabber {
    fn attach(&self, tracks: &[TrackDescriptor]) -> CaptureResult<Box<dyn VideoSink>> {
        init_gstreamer()?;
        let video = tracks
            .iter()
            .find(|track| track.kind == TrackKind::Video)
            .ok_or_else(|| CaptureError::frame_unavailable("no video track to read from"))?;

        let launch = format!(
            "{} ! videoconvert ! video/x-raw,format=RGBA ! appsink name={APPSINK_NAME} max-buffers=1 drop=true sync=false",
            video.source
        );
        let pipeline = gst::parse::launch(&launch)
            .map_err(|e| CaptureError::frame_unavailable(format!("Failed to build frame pipeline: {e}")))?
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| CaptureError::frame_unavailable("Launch string did not produce a pipeline"))?;
        let appsink = pipeline
            .by_name(APPSINK_NAME)
            .and_then(|element| element.downcast::<gst_app::AppSink>().ok())
            .ok_or_else(|| CaptureError::frame_unavailable("frame pipeline has no appsink"))?;

        Ok(Box::new(GstVideoSink {
            pipeline,
            appsink,
            info: None,
            pending: None,
        }))
    }
}

struct GstVideoSink {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    info: Option<gst_video::VideoInfo>,
    pending: Option<gst::Sample>,
}

impl GstVideoSink {
    fn set_state(&self, state: gst::State) -> CaptureResult<()> {
        self.pipeline
            .set_state(state)
            .map(|_| ())
            .map_err(|e| CaptureError::frame_unavailable(format!("Frame pipeline refused {state:?}: {e:?}")))
    }
}

#[async_trait]
impl VideoSink for GstVideoSink {
    async fn load_metadata(&mut self) -> CaptureResult<FrameSize> {
        // Caps are only known once a live source produces its first buffer.
        self.set_state(gst::State::Playing)?;

        let appsink = self.appsink.clone();
        let sample = tokio::task::spawn_blocking(move || {
            appsink.try_pull_sample(gst::ClockTime::from_seconds(FIRST_FRAME_TIMEOUT_SECS))
        })
        .await
        .map_err(|e| CaptureError::frame_unavailable(format!("Frame wait aborted: {e}")))?
        .ok_or_else(|| {
            CaptureError::frame_unavailable(format!(
                "no frame within {FIRST_FRAME_TIMEOUT_SECS}s"
            ))
        })?;

        let caps = sample
            .caps()
            .ok_or_else(|| CaptureError::frame_unavailable("frame has no caps"))?;
        let info = gst_video::VideoInfo::from_caps(caps)
            .map_err(|e| CaptureError::frame_unavailable(format!("Unreadable frame caps: {e}")))?;

        let size = FrameSize {
            width: info.width(),
            height: info.height(),
        };
        tracing::debug!(width = size.width, height = size.height, "Frame metadata loaded");
        self.info = Some(info);
        self.pending = Some(sample);
        Ok(size)
    }

    fn play(&mut self) -> CaptureResult<()> {
        self.set_state(gst::State::Playing)
    }

    fn current_frame(&mut self) -> CaptureResult<Option<RgbaFrame>> {
        let Some(info) = &self.info else {
            return Ok(None);
        };
        let sample = self
            .appsink
            .try_pull_sample(gst::ClockTime::from_mseconds(FRAME_POLL_MS))
            .or_else(|| self.pending.take());
        let Some(sample) = sample else {
            return Ok(None);
        };
        let buffer = sample
            .buffer()
            .ok_or_else(|| CaptureError::frame_unavailable("frame sample has no buffer"))?;
        let map = buffer
            .map_readable()
            .map_err(|e| CaptureError::frame_unavailable(format!("Unreadable frame buffer: {e}")))?;

        let stride = usize::try_from(info.stride()[0])
            .map_err(|_| CaptureError::frame_unavailable("negative frame stride"))?;
        let data = pack_rows(map.as_slice(), info.width(), info.height(), stride);
        Ok(Some(RgbaFrame {
            width: info.width(),
            height: info.height(),
            data,
        }))
    }
}

impl Drop for GstVideoSink {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(error = ?e, "Failed to shut down frame pipeline");
        }
    }
}

/// Copy RGBA rows out of a padded buffer into a tightly packed one.
fn pack_rows(src: &[u8], width: u32, height: u32, stride: usize) -> Vec<u8> {
    let row_bytes = width as usize * 4;
    let mut data = Vec::with_capacity(row_bytes * height as usize);
    for row in src.chunks(stride).take(height as usize) {
        if row.len() < row_bytes {
            break;
        }
        data.extend_from_slice(&row[..row_bytes]);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_rows_are_packed() {
        // 2x2 RGBA with 4 bytes of padding per row.
        let src = [
            1, 1, 1, 1, 2, 2, 2, 2, 0, 0, 0, 0, //
            3, 3, 3, 3, 4, 4, 4, 4, 0, 0, 0, 0,
        ];
        let packed = pack_rows(&src, 2, 2, 12);
        assert_eq!(packed, vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4]);
    }

    #[test]
    fn truncated_buffer_yields_short_frame() {
        let packed = pack_rows(&[9; 8], 2, 2, 8);
        assert_eq!(packed.len(), 8);
    }
}
