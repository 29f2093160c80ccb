//! Recording pipeline: feeds acquired streams to an encoder, collects the
//! encoded chunks, and builds the final artifact once the encoder flushes.

use capturescreen_capture_model::{Artifact, CaptureConfig};
use capturescreen_common::error::{CaptureError, CaptureResult};

use crate::events::{EventSender, SessionEvent};
use crate::media::{AcquiredStreams, TrackDescriptor};

/// Container/codec pair every recording is encoded with.
pub const RECORDING_MIME_TYPE: &str = "video/webm;codecs=vp9";

/// Parameters handed to an encoder for one recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub mime_type: &'static str,
    pub video_bitrate_bps: u32,
    pub frame_rate: u32,
}

impl EncoderSettings {
    pub fn for_config(config: &CaptureConfig) -> Self {
        let profile = config.quality.profile();
        Self {
            mime_type: RECORDING_MIME_TYPE,
            video_bitrate_bps: profile.bitrate_bps,
            frame_rate: profile.frame_rate,
        }
    }
}

/// Where an encoder reports its output.
///
/// Safe to clone into encoder callback threads.
#[derive(Debug, Clone)]
pub struct EncoderSink {
    events: EventSender,
}

impl EncoderSink {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }

    /// Deliver the next chunk of container bytes.
    pub fn chunk(&self, bytes: Vec<u8>) {
        self.events.send(SessionEvent::Chunk(bytes));
    }

    /// Report that the final chunk has been delivered.
    pub fn flushed(&self) {
        self.events.send(SessionEvent::EncoderFlushed);
    }

    /// Report a failure after the encoder started.
    pub fn failed(&self, message: impl Into<String>) {
        self.events.send(SessionEvent::EncoderFailed(message.into()));
    }
}

/// A running encoder. Output arrives through the [`EncoderSink`].
pub trait Encoder: Send {
    fn start(&mut self, sink: EncoderSink) -> CaptureResult<()>;

    /// Ask the encoder to drain. Completion is reported by
    /// [`EncoderSink::flushed`], never by this call returning.
    fn request_stop(&mut self) -> CaptureResult<()>;
}

/// Creates encoders for a combined stream.
pub trait EncoderFactory: Send + Sync {
    /// Fails with [`CaptureError::EncoderUnavailable`] when the codec profile
    /// cannot be set up.
    fn create(
        &self,
        tracks: &[TrackDescriptor],
        settings: &EncoderSettings,
    ) -> CaptureResult<Box<dyn Encoder>>;
}

/// Append-only, ordered encoded fragments. Frozen once taken.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
    total_bytes: usize,
    frozen: bool,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Empty chunks and chunks after freezing are dropped.
    pub fn push(&mut self, chunk: Vec<u8>) -> bool {
        if self.frozen || chunk.is_empty() {
            return false;
        }
        self.total_bytes += chunk.len();
        self.chunks.push(chunk);
        true
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Freeze and concatenate in arrival order.
    pub fn concat(&mut self) -> Vec<u8> {
        self.frozen = true;
        let mut bytes = Vec::with_capacity(self.total_bytes);
        for chunk in self.chunks.drain(..) {
            bytes.extend_from_slice(&chunk);
        }
        bytes
    }
}

/// Handle to one in-progress recording's encoder and chunk buffer.
pub struct RecordingPipeline {
    encoder: Box<dyn Encoder>,
    chunks: ChunkBuffer,
    stop_requested: bool,
    flushed: bool,
}

impl RecordingPipeline {
    /// Create and start an encoder for the combined stream.
    pub fn start(
        streams: &AcquiredStreams,
        config: &CaptureConfig,
        encoders: &dyn EncoderFactory,
        sink: EncoderSink,
    ) -> CaptureResult<Self> {
        let settings = EncoderSettings::for_config(config);
        let tracks = streams.combined();
        tracing::info!(
            mime = settings.mime_type,
            bitrate_bps = settings.video_bitrate_bps,
            tracks = tracks.len(),
            "Starting recording pipeline"
        );

        let mut encoder = encoders.create(&tracks, &settings)?;
        encoder.start(sink)?;

        Ok(Self {
            encoder,
            chunks: ChunkBuffer::new(),
            stop_requested: false,
            flushed: false,
        })
    }

    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        let len = chunk.len();
        if !self.chunks.push(chunk) {
            tracing::debug!(len, "Dropped chunk");
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Ask the encoder to drain. Repeated calls are no-ops.
    pub fn request_stop(&mut self) -> CaptureResult<()> {
        if self.stop_requested {
            return Ok(());
        }
        self.stop_requested = true;
        self.encoder.request_stop()
    }

    /// Record that the encoder delivered its final chunk.
    pub fn mark_flushed(&mut self) {
        self.flushed = true;
    }

    /// Build the recording artifact from every chunk, in arrival order.
    ///
    /// Refuses to run before the encoder has flushed, since the container
    /// would be missing its tail.
    pub fn finalize(mut self) -> CaptureResult<Artifact> {
        if !self.flushed {
            return Err(CaptureError::encoder(
                "recording finalized before the encoder flushed",
            ));
        }
        let chunk_count = self.chunks.len();
        let bytes = self.chunks.concat();
        tracing::info!(chunk_count, bytes = bytes.len(), "Recording finalized");
        Ok(Artifact::recording(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_concatenate_in_arrival_order() {
        let mut buffer = ChunkBuffer::new();
        assert!(buffer.push(b"A".to_vec()));
        assert!(buffer.push(b"BB".to_vec()));
        assert!(buffer.push(b"CCC".to_vec()));
        assert_eq!(buffer.total_bytes(), 6);
        assert_eq!(buffer.concat(), b"ABBCCC".to_vec());
    }

    #[test]
    fn empty_and_late_chunks_are_dropped() {
        let mut buffer = ChunkBuffer::new();
        assert!(!buffer.push(Vec::new()));
        assert!(buffer.push(vec![1]));
        let _ = buffer.concat();
        assert!(!buffer.push(vec![2]));
    }

    #[test]
    fn settings_follow_quality_bitrate() {
        use capturescreen_capture_model::Quality;

        let high = EncoderSettings::for_config(&CaptureConfig::new(Quality::High, false, 0));
        let medium = EncoderSettings::for_config(&CaptureConfig::new(Quality::Medium, true, 0));
        assert_eq!(high.video_bitrate_bps, 2_500_000);
        assert_eq!(medium.video_bitrate_bps, 1_000_000);
        assert_eq!(high.mime_type, RECORDING_MIME_TYPE);
    }
}
