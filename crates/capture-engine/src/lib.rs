//! CaptureScreen Capture Engine
//!
//! Turns display and microphone streams into in-memory artifacts: WebM
//! recordings through [`CaptureSession`] and PNG screenshots through
//! [`SnapshotCapture`]. [`ArtifactExporter`] writes either to disk.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                CaptureSession                 │
//! │  ┌────────────┐ ┌──────────┐ ┌──────────────┐ │
//! │  │ Acquired   │ │ Encoder  │ │ Timebase +   │ │
//! │  │ Streams    │ │ Pipeline │ │ Deadline     │ │
//! │  └─────┬──────┘ └────┬─────┘ └──────┬───────┘ │
//! │        │ track ended │ chunks/flush │ ticks   │
//! │        ▼             ▼              ▼         │
//! │  ┌──────────────────────────────────────────┐ │
//! │  │   event queue (generation-tagged)        │ │
//! │  └──────────────────────────────────────────┘ │
//! └───────────────────────┬───────────────────────┘
//!                         ▼
//!              Artifact ──► ArtifactExporter
//! ```
//!
//! Device access, encoding, and frame reading sit behind the
//! [`MediaDevices`], [`EncoderFactory`], and [`VideoSinkFactory`] traits;
//! [`backend`] provides the GStreamer implementations.

pub mod backend;
pub mod events;
pub mod export;
pub mod media;
pub mod pipeline;
pub mod session;
pub mod slot;
pub mod snapshot;
pub mod timebase;

pub use events::SessionEvent;
pub use export::{ArtifactExporter, DirectoryDownloads, DownloadSink};
pub use media::{
    AcquiredStreams, AudioConstraints, DisplayConstraints, MediaDevices, MediaStream,
    MediaTrack, TrackDescriptor, TrackKind,
};
pub use pipeline::{Encoder, EncoderFactory, EncoderSettings, EncoderSink, RECORDING_MIME_TYPE};
pub use session::{CaptureSession, RecordingSummary, SessionState, StopReason};
pub use slot::CaptureSlot;
pub use snapshot::{FrameSize, RgbaFrame, SnapshotCapture, VideoSink, VideoSinkFactory};
