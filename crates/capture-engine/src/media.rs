//! Media acquisition: requesting display/microphone streams and owning them
//! until they are released.

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use capturescreen_capture_model::{CaptureConfig, Quality};
use capturescreen_common::error::{CaptureError, CaptureResult};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::events::{EventSender, SessionEvent};

/// Kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Constraints for a display capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConstraints {
    /// `None` lets the source choose (screenshots).
    pub frame_rate: Option<u32>,
    pub width: u32,
    pub height: u32,
}

impl DisplayConstraints {
    pub fn for_recording(quality: Quality) -> Self {
        let profile = quality.profile();
        Self {
            frame_rate: Some(profile.frame_rate),
            width: profile.width,
            height: profile.height,
        }
    }

    pub fn for_snapshot(quality: Quality) -> Self {
        let profile = quality.profile();
        Self {
            frame_rate: None,
            width: profile.width,
            height: profile.height,
        }
    }
}

/// Constraints for a microphone capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl AudioConstraints {
    /// Voice capture with echo cancellation and noise suppression on.
    pub fn voice() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// Fires when a track ends on its own (for example the user revoked the share).
#[derive(Clone)]
pub struct EndedNotifier {
    tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl EndedNotifier {
    /// Report the end of the track. Only the first call has an effect.
    pub fn notify(&self) {
        let sender = match self.tx.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }
}

impl fmt::Debug for EndedNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EndedNotifier")
    }
}

/// Receiving half of an [`EndedNotifier`].
///
/// Resolves only if the notifier fires; dropping every notifier without
/// firing means the track was stopped deliberately.
#[derive(Debug)]
pub struct EndedSignal {
    rx: oneshot::Receiver<()>,
}

impl EndedSignal {
    /// Wait for the track to end. Returns `false` if it never will.
    pub async fn wait(self) -> bool {
        self.rx.await.is_ok()
    }
}

/// Create a linked notifier/signal pair for a track.
pub fn ended_channel() -> (EndedNotifier, EndedSignal) {
    let (tx, rx) = oneshot::channel();
    (
        EndedNotifier {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        EndedSignal { rx },
    )
}

/// Backend-facing description of a track, consumed by encoders and sinks.
#[derive(Debug, Clone)]
pub struct TrackDescriptor {
    pub kind: TrackKind,
    pub label: String,
    /// Backend-specific source description (for GStreamer, a launch fragment).
    pub source: String,
    /// Lets the consumer report that the source ended on its own.
    pub on_ended: Option<EndedNotifier>,
}

/// A single hardware track handle.
pub trait MediaTrack: Send {
    fn descriptor(&self) -> TrackDescriptor;

    /// Stop the track and free the device.
    fn stop(&mut self);
}

/// A group of tracks returned by a single device request.
pub struct MediaStream {
    tracks: Vec<Box<dyn MediaTrack>>,
    ended: Option<EndedSignal>,
}

impl MediaStream {
    pub fn new(tracks: Vec<Box<dyn MediaTrack>>) -> Self {
        Self {
            tracks,
            ended: None,
        }
    }

    /// Attach the signal that fires when this stream's video track ends.
    pub fn with_ended_signal(mut self, signal: EndedSignal) -> Self {
        self.ended = Some(signal);
        self
    }

    pub fn tracks(&self) -> impl Iterator<Item = TrackDescriptor> + '_ {
        self.tracks.iter().map(|track| track.descriptor())
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn stop_all(&mut self) {
        for track in &mut self.tracks {
            track.stop();
        }
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("tracks", &self.tracks.len())
            .field("observes_end", &self.ended.is_some())
            .finish()
    }
}

/// Source of capture streams (screen-share picker, microphone).
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Ask the user for a display stream. May wait on a picker indefinitely.
    async fn get_display_media(&self, constraints: &DisplayConstraints)
        -> CaptureResult<MediaStream>;

    /// Ask for a microphone stream.
    async fn get_user_media(&self, constraints: &AudioConstraints) -> CaptureResult<MediaStream>;
}

/// Streams held for the duration of one capture.
///
/// The display stream is always first. Releasing stops every track exactly
/// once; later calls and the eventual drop do nothing.
pub struct AcquiredStreams {
    streams: Vec<MediaStream>,
    observer: Option<JoinHandle<()>>,
    released: bool,
}

impl AcquiredStreams {
    fn new(display: MediaStream) -> CaptureResult<Self> {
        let mut acquired = Self {
            streams: vec![display],
            observer: None,
            released: false,
        };
        if acquired.streams[0].is_empty() {
            acquired.release();
            return Err(CaptureError::device("display stream has no tracks"));
        }
        Ok(acquired)
    }

    /// Tracks of every held stream as one combined, ordered list.
    pub fn combined(&self) -> Vec<TrackDescriptor> {
        self.streams.iter().flat_map(|stream| stream.tracks()).collect()
    }

    pub fn has_audio(&self) -> bool {
        self.combined()
            .iter()
            .any(|track| track.kind == TrackKind::Audio)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Stop every track. Returns `false` if already released.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        if let Some(observer) = self.observer.take() {
            observer.abort();
        }
        for stream in &mut self.streams {
            stream.stop_all();
        }
        tracing::info!(streams = self.streams.len(), "Released capture streams");
        true
    }

    fn push(&mut self, stream: MediaStream) {
        self.streams.push(stream);
    }

    /// Forward the display track's end to the session as a stop trigger.
    fn observe_display_end(&mut self, events: EventSender) {
        let Some(signal) = self.streams.first_mut().and_then(|s| s.ended.take()) else {
            return;
        };
        self.observer = Some(tokio::spawn(async move {
            if signal.wait().await {
                tracing::info!(generation = events.generation(), "Display track ended");
                events.send(SessionEvent::TrackEnded);
            }
        }));
    }
}

impl Drop for AcquiredStreams {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for AcquiredStreams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquiredStreams")
            .field("streams", &self.streams)
            .field("released", &self.released)
            .finish()
    }
}

/// Acquire the display stream, plus the microphone when audio is enabled.
///
/// If the microphone request fails, the display stream is released before
/// the error is returned. When `events` is given, an unsolicited end of the
/// display track is posted as [`SessionEvent::TrackEnded`].
pub async fn acquire(
    devices: &dyn MediaDevices,
    config: &CaptureConfig,
    events: Option<EventSender>,
) -> CaptureResult<AcquiredStreams> {
    let constraints = DisplayConstraints::for_recording(config.quality);
    tracing::info!(?constraints, audio = config.audio_enabled, "Requesting display stream");

    let display = devices.get_display_media(&constraints).await?;
    let mut acquired = AcquiredStreams::new(display)?;

    if config.audio_enabled {
        match devices.get_user_media(&AudioConstraints::voice()).await {
            Ok(audio) => acquired.push(audio),
            Err(e) => {
                tracing::warn!(error = %e, "Microphone request failed; releasing display");
                acquired.release();
                return Err(e);
            }
        }
    }

    if let Some(events) = events {
        acquired.observe_display_end(events);
    }

    Ok(acquired)
}

/// Acquire a display-only stream (no audio, no end observer).
pub async fn acquire_display(
    devices: &dyn MediaDevices,
    constraints: &DisplayConstraints,
) -> CaptureResult<AcquiredStreams> {
    let display = devices.get_display_media(constraints).await?;
    AcquiredStreams::new(display)
}
