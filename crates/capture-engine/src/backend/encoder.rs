//! VP9/Opus WebM encoder built from a GStreamer launch line.
//!
//! Encoded container bytes are pulled from an `appsink` and handed to the
//! session as chunks. Stopping sends EOS and the session is told the
//! encoder has flushed once the `appsink` sees it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use capturescreen_common::error::{CaptureError, CaptureResult};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;

use super::{has_element, init_gstreamer, DISPLAY_SOURCE_NAME};
use crate::media::{EndedNotifier, TrackDescriptor, TrackKind};
use crate::pipeline::{Encoder, EncoderFactory, EncoderSettings, EncoderSink};

const APPSINK_NAME: &str = "chunks";

/// How long a requested stop may take before the recording is abandoned.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const BUS_POLL: Duration = Duration::from_millis(100);

/// Creates [`GstEncoder`]s for acquired tracks.
#[derive(Debug, Clone, Copy, Default)]
pub struct GstEncoderFactory;

impl EncoderFactory for GstEncoderFactory {
    fn create(
        &self,
        tracks: &[TrackDescriptor],
        settings: &EncoderSettings,
    ) -> CaptureResult<Box<dyn Encoder>> {
        init_gstreamer().map_err(|e| CaptureError::encoder_unavailable(e.to_string()))?;

        let video = tracks
            .iter()
            .find(|track| track.kind == TrackKind::Video)
            .ok_or_else(|| CaptureError::device("recording needs a video track"))?;
        let audio = tracks.iter().find(|track| track.kind == TrackKind::Audio);

        let mut needed = vec!["vp9enc", "webmmux", "appsink"];
        if audio.is_some() {
            needed.push("opusenc");
        }
        if let Some(missing) = needed.into_iter().find(|name| !has_element(name)) {
            return Err(CaptureError::encoder_unavailable(format!(
                "{} is not supported: GStreamer element '{missing}' is not installed",
                settings.mime_type
            )));
        }

        let launch = launch_line(video, audio, settings);
        tracing::debug!(%launch, "Building encoder pipeline");

        let pipeline = gst::parse::launch(&launch)
            .map_err(|e| {
                CaptureError::encoder_unavailable(format!("Failed to build encoder pipeline: {e}"))
            })?
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| {
                CaptureError::encoder_unavailable("Launch string did not produce a pipeline")
            })?;

        Ok(Box::new(GstEncoder {
            pipeline,
            display_ended: video.on_ended.clone(),
            stop_requested: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
            bus_thread: None,
        }))
    }
}

fn launch_line(
    video: &TrackDescriptor,
    audio: Option<&TrackDescriptor>,
    settings: &EncoderSettings,
) -> String {
    let mut launch = format!(
        "{} ! queue max-size-buffers=200 leaky=downstream \
         ! vp9enc target-bitrate={} deadline=1 cpu-used=8 keyframe-max-dist={} \
         ! queue ! webmmux name=mux streamable=true \
         ! appsink name={APPSINK_NAME} sync=false emit-signals=false",
        video.source,
        settings.video_bitrate_bps,
        settings.frame_rate * 2,
    );
    if let Some(audio) = audio {
        launch.push_str(&format!(
            " {} ! queue ! audioconvert ! audioresample ! opusenc ! queue ! mux.",
            audio.source
        ));
    }
    launch
}

/// A running GStreamer encoder.
pub struct GstEncoder {
    pipeline: gst::Pipeline,
    display_ended: Option<EndedNotifier>,
    stop_requested: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    bus_thread: Option<JoinHandle<()>>,
}

impl Encoder for GstEncoder {
    fn start(&mut self, sink: EncoderSink) -> CaptureResult<()> {
        let appsink = self
            .pipeline
            .by_name(APPSINK_NAME)
            .and_then(|element| element.downcast::<gst_app::AppSink>().ok())
            .ok_or_else(|| CaptureError::encoder_unavailable("encoder pipeline has no appsink"))?;

        let chunk_sink = sink.clone();
        let eos_sink = sink.clone();
        let stop_requested = Arc::clone(&self.stop_requested);
        let display_ended = self.display_ended.clone();
        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;
                    chunk_sink.chunk(map.as_slice().to_vec());
                    Ok(gst::FlowSuccess::Ok)
                })
                .eos(move |_| {
                    // An EOS nobody asked for means the source went away.
                    if !stop_requested.load(Ordering::SeqCst) {
                        if let Some(notifier) = &display_ended {
                            notifier.notify();
                        }
                    }
                    eos_sink.flushed();
                })
                .build(),
        );

        self.bus_thread = Some(self.watch_bus(sink)?);

        self.pipeline.set_state(gst::State::Playing).map_err(|e| {
            CaptureError::encoder_unavailable(format!("Failed to start encoder pipeline: {e:?}"))
        })?;
        tracing::info!("Encoder pipeline playing");
        Ok(())
    }

    fn request_stop(&mut self) -> CaptureResult<()> {
        self.stop_requested.store(true, Ordering::SeqCst);
        if self.pipeline.send_event(gst::event::Eos::new()) {
            tracing::debug!("EOS sent to encoder pipeline");
            Ok(())
        } else {
            Err(CaptureError::encoder("Failed to send EOS to encoder pipeline"))
        }
    }
}

impl GstEncoder {
    /// Route bus errors: a failing display source ends the track, anything
    /// else fails the recording. Also bounds how long a drain may take.
    fn watch_bus(&self, sink: EncoderSink) -> CaptureResult<JoinHandle<()>> {
        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| CaptureError::encoder_unavailable("encoder pipeline has no bus"))?;
        let pipeline = self.pipeline.clone();
        let display_ended = self.display_ended.clone();
        let stop_requested = Arc::clone(&self.stop_requested);
        let shutdown = Arc::clone(&self.shutdown);

        let handle = std::thread::Builder::new()
            .name("encoder-bus".to_string())
            .spawn(move || {
                let mut drain_deadline: Option<Instant> = None;
                while !shutdown.load(Ordering::SeqCst) {
                    if drain_deadline.is_none() && stop_requested.load(Ordering::SeqCst) {
                        drain_deadline = Some(Instant::now() + DRAIN_TIMEOUT);
                    }
                    if drain_deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        tracing::warn!("Encoder drain timed out after {DRAIN_TIMEOUT:?}");
                        sink.failed("encoder did not flush in time");
                        break;
                    }

                    let Some(msg) = bus.timed_pop(gst::ClockTime::from_mseconds(
                        BUS_POLL.as_millis() as u64,
                    )) else {
                        continue;
                    };
                    match msg.view() {
                        gst::MessageView::Eos(_) => {
                            tracing::debug!("Encoder pipeline drained");
                            break;
                        }
                        gst::MessageView::Error(e) => {
                            let from_display = e
                                .src()
                                .is_some_and(|src| src.name().as_str() == DISPLAY_SOURCE_NAME);
                            let message = e.error().to_string();
                            if from_display && !stop_requested.load(Ordering::SeqCst) {
                                tracing::info!(error = %message, "Display source ended");
                                if let Some(notifier) = &display_ended {
                                    notifier.notify();
                                }
                                // Drain whatever already reached the encoder.
                                stop_requested.store(true, Ordering::SeqCst);
                                pipeline.send_event(gst::event::Eos::new());
                            } else {
                                tracing::error!(
                                    error = %message,
                                    debug = ?e.debug(),
                                    "Encoder pipeline error"
                                );
                                sink.failed(message);
                                break;
                            }
                        }
                        _ => {}
                    }
                }
            })
            .map_err(|e| CaptureError::encoder(format!("Failed to spawn bus watcher: {e}")))?;
        Ok(handle)
    }
}

impl Drop for GstEncoder {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(error = ?e, "Failed to shut down encoder pipeline");
        }
        if let Some(handle) = self.bus_thread.take() {
            let _ = handle.join();
        }
    }
}
