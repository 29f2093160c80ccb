//! Scripted stand-ins for devices, encoders, and video sinks.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use capturescreen_capture_engine::media::{ended_channel, EndedNotifier};
use capturescreen_capture_engine::{
    AudioConstraints, DisplayConstraints, Encoder, EncoderFactory, EncoderSettings, EncoderSink,
    FrameSize, MediaDevices, MediaStream, MediaTrack, RgbaFrame, TrackDescriptor, TrackKind,
    VideoSink, VideoSinkFactory,
};
use capturescreen_common::error::{CaptureError, CaptureResult};

/// How a device request will be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Allow,
    Deny,
    Cancel,
    NoTracks,
}

impl Grant {
    fn into_error(self) -> Option<CaptureError> {
        match self {
            Grant::Allow | Grant::NoTracks => None,
            Grant::Deny => Some(CaptureError::permission_denied("denied by test")),
            Grant::Cancel => Some(CaptureError::NoSourceSelected),
        }
    }
}

#[derive(Default)]
struct DeviceCounters {
    display_requests: AtomicUsize,
    audio_requests: AtomicUsize,
    display_stops: Arc<AtomicUsize>,
    audio_stops: Arc<AtomicUsize>,
}

/// Media devices answering from a script and counting every stop.
pub struct FakeDevices {
    display: Mutex<Grant>,
    audio: Mutex<Grant>,
    counters: DeviceCounters,
    last_display: Mutex<Option<EndedNotifier>>,
    last_constraints: Mutex<Option<DisplayConstraints>>,
}

impl FakeDevices {
    pub fn new() -> Arc<Self> {
        Self::scripted(Grant::Allow, Grant::Allow)
    }

    pub fn scripted(display: Grant, audio: Grant) -> Arc<Self> {
        Arc::new(Self {
            display: Mutex::new(display),
            audio: Mutex::new(audio),
            counters: DeviceCounters::default(),
            last_display: Mutex::new(None),
            last_constraints: Mutex::new(None),
        })
    }

    pub fn set_display(&self, grant: Grant) {
        *self.display.lock().unwrap() = grant;
    }

    pub fn display_requests(&self) -> usize {
        self.counters.display_requests.load(Ordering::SeqCst)
    }

    pub fn audio_requests(&self) -> usize {
        self.counters.audio_requests.load(Ordering::SeqCst)
    }

    pub fn display_stops(&self) -> usize {
        self.counters.display_stops.load(Ordering::SeqCst)
    }

    pub fn audio_stops(&self) -> usize {
        self.counters.audio_stops.load(Ordering::SeqCst)
    }

    pub fn last_constraints(&self) -> Option<DisplayConstraints> {
        *self.last_constraints.lock().unwrap()
    }

    /// Simulate the user revoking the screen share.
    pub fn end_display(&self) {
        if let Some(notifier) = self.last_display.lock().unwrap().as_ref() {
            notifier.notify();
        }
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn get_display_media(
        &self,
        constraints: &DisplayConstraints,
    ) -> CaptureResult<MediaStream> {
        self.counters.display_requests.fetch_add(1, Ordering::SeqCst);
        *self.last_constraints.lock().unwrap() = Some(*constraints);

        let grant = *self.display.lock().unwrap();
        if let Some(error) = grant.into_error() {
            return Err(error);
        }
        if grant == Grant::NoTracks {
            return Ok(MediaStream::new(Vec::new()));
        }

        let (notifier, signal) = ended_channel();
        *self.last_display.lock().unwrap() = Some(notifier.clone());
        let track = FakeTrack {
            kind: TrackKind::Video,
            stops: Arc::clone(&self.counters.display_stops),
            on_ended: Some(notifier),
        };
        Ok(MediaStream::new(vec![Box::new(track)]).with_ended_signal(signal))
    }

    async fn get_user_media(&self, constraints: &AudioConstraints) -> CaptureResult<MediaStream> {
        self.counters.audio_requests.fetch_add(1, Ordering::SeqCst);
        assert!(constraints.echo_cancellation && constraints.noise_suppression);

        let grant = *self.audio.lock().unwrap();
        if let Some(error) = grant.into_error() {
            return Err(error);
        }
        let track = FakeTrack {
            kind: TrackKind::Audio,
            stops: Arc::clone(&self.counters.audio_stops),
            on_ended: None,
        };
        Ok(MediaStream::new(vec![Box::new(track)]))
    }
}

struct FakeTrack {
    kind: TrackKind,
    stops: Arc<AtomicUsize>,
    on_ended: Option<EndedNotifier>,
}

impl MediaTrack for FakeTrack {
    fn descriptor(&self) -> TrackDescriptor {
        TrackDescriptor {
            kind: self.kind,
            label: format!("fake-{:?}", self.kind).to_lowercase(),
            source: "fakesrc".to_string(),
            on_ended: self.on_ended.clone(),
        }
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Encoders that emit a scripted tail of chunks when asked to stop, then
/// flush (optionally after a delay).
pub struct FakeEncoders {
    unavailable: AtomicBool,
    tail: Vec<Vec<u8>>,
    flush_delay: Option<Duration>,
    sinks: Arc<Mutex<Vec<EncoderSink>>>,
    created: AtomicUsize,
    stop_requests: Arc<AtomicUsize>,
    last_tracks: Mutex<Vec<TrackKind>>,
    last_settings: Mutex<Option<EncoderSettings>>,
}

impl FakeEncoders {
    pub fn new() -> Arc<Self> {
        Self::with_tail(Vec::new(), None)
    }

    pub fn with_tail(tail: Vec<Vec<u8>>, flush_delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            unavailable: AtomicBool::new(false),
            tail,
            flush_delay,
            sinks: Arc::new(Mutex::new(Vec::new())),
            created: AtomicUsize::new(0),
            stop_requests: Arc::new(AtomicUsize::new(0)),
            last_tracks: Mutex::new(Vec::new()),
            last_settings: Mutex::new(None),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        let encoders = Self::new();
        encoders.unavailable.store(true, Ordering::SeqCst);
        encoders
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn stop_requests(&self) -> usize {
        self.stop_requests.load(Ordering::SeqCst)
    }

    pub fn last_tracks(&self) -> Vec<TrackKind> {
        self.last_tracks.lock().unwrap().clone()
    }

    pub fn last_settings(&self) -> Option<EncoderSettings> {
        *self.last_settings.lock().unwrap()
    }

    /// The sink handed to the most recently started encoder.
    pub fn sink(&self) -> EncoderSink {
        self.sinks
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no encoder started")
    }
}

impl EncoderFactory for FakeEncoders {
    fn create(
        &self,
        tracks: &[TrackDescriptor],
        settings: &EncoderSettings,
    ) -> CaptureResult<Box<dyn Encoder>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CaptureError::encoder_unavailable("vp9 not supported in test"));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        *self.last_tracks.lock().unwrap() = tracks.iter().map(|track| track.kind).collect();
        *self.last_settings.lock().unwrap() = Some(*settings);
        Ok(Box::new(FakeEncoder {
            tail: self.tail.clone(),
            flush_delay: self.flush_delay,
            stop_requests: Arc::clone(&self.stop_requests),
            sink: None,
            started: Arc::clone(&self.sinks),
        }))
    }
}

struct FakeEncoder {
    tail: Vec<Vec<u8>>,
    flush_delay: Option<Duration>,
    stop_requests: Arc<AtomicUsize>,
    sink: Option<EncoderSink>,
    started: Arc<Mutex<Vec<EncoderSink>>>,
}

impl Encoder for FakeEncoder {
    fn start(&mut self, sink: EncoderSink) -> CaptureResult<()> {
        self.started.lock().unwrap().push(sink.clone());
        self.sink = Some(sink);
        Ok(())
    }

    fn request_stop(&mut self) -> CaptureResult<()> {
        self.stop_requests.fetch_add(1, Ordering::SeqCst);
        let Some(sink) = self.sink.clone() else {
            return Err(CaptureError::encoder("stop before start"));
        };
        let tail = self.tail.clone();
        match self.flush_delay {
            Some(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    for chunk in tail {
                        sink.chunk(chunk);
                    }
                    sink.flushed();
                });
            }
            None => {
                for chunk in tail {
                    sink.chunk(chunk);
                }
                sink.flushed();
            }
        }
        Ok(())
    }
}

/// Scripted answer of a [`FakeSink`].
#[derive(Debug, Clone)]
pub struct FrameScript {
    pub size: FrameSize,
    pub frame: Option<RgbaFrame>,
}

impl FrameScript {
    /// A solid-colour source of the given size.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            size: FrameSize { width, height },
            frame: Some(RgbaFrame {
                width,
                height,
                data: rgba.repeat((width * height) as usize),
            }),
        }
    }
}

/// Video sinks that replay a [`FrameScript`].
pub struct FakeSinks {
    script: Mutex<FrameScript>,
    played: Arc<AtomicUsize>,
}

impl FakeSinks {
    pub fn new(script: FrameScript) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            played: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn set_script(&self, script: FrameScript) {
        *self.script.lock().unwrap() = script;
    }

    pub fn played(&self) -> usize {
        self.played.load(Ordering::SeqCst)
    }
}

impl VideoSinkFactory for FakeSinks {
    fn attach(&self, tracks: &[TrackDescriptor]) -> CaptureResult<Box<dyn VideoSink>> {
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].kind, TrackKind::Video);
        Ok(Box::new(FakeSink {
            script: self.script.lock().unwrap().clone(),
            played: Arc::clone(&self.played),
        }))
    }
}

struct FakeSink {
    script: FrameScript,
    played: Arc<AtomicUsize>,
}

#[async_trait]
impl VideoSink for FakeSink {
    async fn load_metadata(&mut self) -> CaptureResult<FrameSize> {
        Ok(self.script.size)
    }

    fn play(&mut self) -> CaptureResult<()> {
        self.played.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn current_frame(&mut self) -> CaptureResult<Option<RgbaFrame>> {
        Ok(self.script.frame.clone())
    }
}
