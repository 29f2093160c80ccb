//! Recording session management.
//!
//! [`CaptureSession`] is the record-mode state machine:
//!
//! ```text
//!  Idle/Failed/Previewing --start--> Requesting --ok--> Recording
//!                                        |                  |
//!                                        +--err--> Failed   | stop / deadline / track ended
//!                                                           v
//!                           Previewing <--flushed-- Finalizing
//! ```
//!
//! Every asynchronous input (timer ticks, the auto-stop deadline, the display
//! track ending, encoder output) arrives as a message on the session's own
//! queue and is applied by [`CaptureSession::next_event`] or
//! [`CaptureSession::process_pending`]. Each Recording entry gets a new
//! generation number, and messages from an older generation are dropped.

use std::sync::Arc;

use capturescreen_capture_model::{Artifact, ArtifactHandle, CaptureConfig};
use capturescreen_common::clock::RecordingClock;
use capturescreen_common::error::{CaptureError, CaptureResult};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::events::{Envelope, EventReceiver, EventSender, SessionEvent};
use crate::media::{self, AcquiredStreams, MediaDevices};
use crate::pipeline::{EncoderFactory, EncoderSink, RecordingPipeline};
use crate::slot::{CaptureSlot, SlotGuard};
use crate::timebase::{DeadlineTimer, Timebase};

/// State of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing captured yet.
    Idle,
    /// Waiting on stream acquisition and encoder start.
    Requesting,
    /// Recording in progress.
    Recording,
    /// Stop requested; waiting for the encoder to flush.
    Finalizing,
    /// A finished recording is available.
    Previewing,
    /// The last attempt failed; ready for a new start.
    Failed,
}

impl SessionState {
    /// Whether this state holds capture hardware.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Requesting | SessionState::Recording | SessionState::Finalizing
        )
    }
}

/// What moved a recording into Finalizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The user asked to stop.
    User,
    /// The auto-stop deadline fired.
    Deadline,
    /// The display track ended (share revoked, window closed).
    SourceEnded,
    /// The encoder finished on its own.
    EncoderStopped,
}

/// Timing and size of the last finished recording.
///
/// `elapsed_at_stop` is the timer value when finalizing began.
/// `duration_secs` is the measured time from Recording entry until the
/// encoder flushed, so an auto-stopped recording runs slightly past its
/// limit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingSummary {
    pub stop_reason: StopReason,
    pub elapsed_at_stop: u64,
    pub duration_secs: f64,
    pub chunk_count: usize,
    pub bytes: usize,
}

/// Everything owned by one Recording entry. Dropping it releases the
/// streams, cancels the deadline, and frees the capture slot.
struct ActiveRecording {
    config: CaptureConfig,
    streams: AcquiredStreams,
    pipeline: RecordingPipeline,
    deadline: Option<DeadlineTimer>,
    clock: RecordingClock,
    stop: Option<(StopReason, u64)>,
    _slot: SlotGuard,
}

/// A recording session that coordinates stream acquisition, encoding, and
/// the recording timers.
pub struct CaptureSession {
    devices: Arc<dyn MediaDevices>,
    encoders: Arc<dyn EncoderFactory>,
    slot: CaptureSlot,
    state: SessionState,
    generation: u64,
    events_tx: mpsc::UnboundedSender<Envelope>,
    events_rx: EventReceiver,
    timebase: Timebase,
    active: Option<ActiveRecording>,
    artifact: Option<Arc<Artifact>>,
    /// The previous recording while a restart is acquiring streams.
    superseded: Option<Arc<Artifact>>,
    summary: Option<RecordingSummary>,
    last_error: Option<String>,
}

impl CaptureSession {
    /// Create an idle session with its own capture slot.
    pub fn new(devices: Arc<dyn MediaDevices>, encoders: Arc<dyn EncoderFactory>) -> Self {
        let (events_tx, events_rx) = EventSender::channel();
        Self {
            devices,
            encoders,
            slot: CaptureSlot::new(),
            state: SessionState::Idle,
            generation: 0,
            events_tx,
            events_rx,
            timebase: Timebase::new(),
            active: None,
            artifact: None,
            superseded: None,
            summary: None,
            last_error: None,
        }
    }

    /// Share a capture slot with other captures (screenshots).
    pub fn with_slot(mut self, slot: CaptureSlot) -> Self {
        self.slot = slot;
        self
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whole seconds recorded so far; frozen outside Recording.
    pub fn elapsed_secs(&self) -> u64 {
        self.timebase.elapsed()
    }

    /// The configuration snapshot of the recording in progress.
    pub fn config(&self) -> Option<CaptureConfig> {
        self.active.as_ref().map(|active| active.config)
    }

    /// Whether an auto-stop deadline is currently armed.
    pub fn deadline_armed(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.deadline.is_some())
    }

    /// Handle to the finished recording, while it has not been superseded.
    pub fn artifact(&self) -> Option<ArtifactHandle> {
        self.artifact.as_ref().map(ArtifactHandle::new)
    }

    pub fn summary(&self) -> Option<&RecordingSummary> {
        self.summary.as_ref()
    }

    /// Message of the failure that put the session into Failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start a new recording with a frozen copy of `config`.
    ///
    /// Starting from Previewing withholds the previous recording while
    /// streams are requested, and revokes it only once the new recording is
    /// running. On failure the session is left in Failed with every acquired
    /// stream released and the previous recording restored, and the error is
    /// returned.
    pub async fn start(&mut self, config: CaptureConfig) -> CaptureResult<()> {
        if self.state.is_active() {
            return Err(CaptureError::CaptureInProgress);
        }
        config.validate()?;
        let slot = self
            .slot
            .try_claim()
            .ok_or(CaptureError::CaptureInProgress)?;

        self.superseded = self.artifact.take();
        self.generation += 1;
        self.last_error = None;
        self.transition(SessionState::Requesting);
        tracing::info!(
            generation = self.generation,
            quality = %config.quality,
            audio = config.audio_enabled,
            auto_stop_secs = config.auto_stop_secs,
            "Starting capture session"
        );

        let events = EventSender::new(self.generation, self.events_tx.clone());
        let devices = Arc::clone(&self.devices);
        let mut streams = match media::acquire(devices.as_ref(), &config, Some(events.clone())).await
        {
            Ok(streams) => streams,
            Err(e) => return Err(self.fail(e)),
        };

        let pipeline = match RecordingPipeline::start(
            &streams,
            &config,
            self.encoders.as_ref(),
            EncoderSink::new(events.clone()),
        ) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                streams.release();
                return Err(self.fail(e));
            }
        };

        self.timebase.start(events.clone());
        let deadline = config
            .auto_stop()
            .map(|after| DeadlineTimer::arm(after, events));

        self.active = Some(ActiveRecording {
            config,
            streams,
            pipeline,
            deadline,
            clock: RecordingClock::start(),
            stop: None,
            _slot: slot,
        });
        if self.superseded.take().is_some() {
            tracing::info!("Revoked previous recording");
        }
        self.transition(SessionState::Recording);
        Ok(())
    }

    /// Request a stop. Returns `false` when not recording (a no-op).
    pub fn stop(&mut self) -> CaptureResult<bool> {
        self.begin_finalize(StopReason::User)
    }

    /// Wait for and apply the next queued event.
    pub async fn next_event(&mut self) -> CaptureResult<()> {
        match self.events_rx.recv().await {
            Some(envelope) => self.dispatch(envelope),
            None => Ok(()),
        }
    }

    /// Apply every event already queued, without waiting.
    pub fn process_pending(&mut self) -> CaptureResult<usize> {
        let mut applied = 0;
        while let Ok(envelope) = self.events_rx.try_recv() {
            applied += 1;
            self.dispatch(envelope)?;
        }
        Ok(applied)
    }

    /// Drive events until the current recording settles.
    ///
    /// Returns the artifact handle once Previewing, or `None` if nothing is
    /// recording. Without an auto-stop this waits for a stop trigger.
    pub async fn wait_for_artifact(&mut self) -> CaptureResult<Option<ArtifactHandle>> {
        while matches!(
            self.state,
            SessionState::Recording | SessionState::Finalizing
        ) {
            self.next_event().await?;
        }
        Ok(match self.state {
            SessionState::Previewing => self.artifact(),
            _ => None,
        })
    }

    /// Stop the recording and wait for the finished artifact.
    pub async fn finish(&mut self) -> CaptureResult<Option<ArtifactHandle>> {
        self.stop()?;
        self.wait_for_artifact().await
    }

    fn dispatch(&mut self, envelope: Envelope) -> CaptureResult<()> {
        if envelope.generation != self.generation {
            tracing::debug!(
                generation = envelope.generation,
                current = self.generation,
                event = ?envelope.event,
                "Dropped event from an earlier recording"
            );
            return Ok(());
        }

        match envelope.event {
            SessionEvent::Tick => {
                if self.state == SessionState::Recording {
                    self.timebase.tick();
                }
            }
            SessionEvent::DeadlineElapsed => {
                self.begin_finalize(StopReason::Deadline)?;
            }
            SessionEvent::TrackEnded => {
                self.begin_finalize(StopReason::SourceEnded)?;
            }
            SessionEvent::Chunk(bytes) => {
                if let Some(active) = self.active.as_mut() {
                    active.pipeline.push_chunk(bytes);
                }
            }
            SessionEvent::EncoderFlushed => self.complete()?,
            SessionEvent::EncoderFailed(message) => {
                if self.active.is_some() {
                    return Err(self.fail(CaptureError::encoder(message)));
                }
            }
        }
        Ok(())
    }

    /// Recording -> Finalizing. No-op from any other state.
    fn begin_finalize(&mut self, reason: StopReason) -> CaptureResult<bool> {
        self.enter_finalizing(reason, true)
    }

    /// Cancels the timers and, when `drain` is set, asks the encoder to
    /// flush. An encoder that already flushed is not asked again.
    fn enter_finalizing(&mut self, reason: StopReason, drain: bool) -> CaptureResult<bool> {
        if self.state != SessionState::Recording {
            tracing::debug!(?reason, state = ?self.state, "Ignored stop trigger");
            return Ok(false);
        }

        let elapsed = self.timebase.elapsed();
        self.timebase.stop();

        let requested = match self.active.as_mut() {
            Some(active) => {
                if let Some(deadline) = active.deadline.take() {
                    deadline.cancel();
                }
                active.stop = Some((reason, elapsed));
                if drain {
                    active.pipeline.request_stop()
                } else {
                    Ok(())
                }
            }
            None => Err(CaptureError::encoder("recording has no active pipeline")),
        };

        self.transition(SessionState::Finalizing);
        tracing::info!(?reason, elapsed_secs = elapsed, "Finalizing recording");

        if let Err(e) = requested {
            return Err(self.fail(e));
        }
        Ok(true)
    }

    /// Finalizing -> Previewing once the encoder has flushed.
    fn complete(&mut self) -> CaptureResult<()> {
        match self.state {
            SessionState::Recording => {
                self.enter_finalizing(StopReason::EncoderStopped, false)?;
            }
            SessionState::Finalizing => {}
            _ => return Ok(()),
        }

        let Some(active) = self.active.take() else {
            return Ok(());
        };
        let ActiveRecording {
            mut streams,
            mut pipeline,
            clock,
            stop,
            ..
        } = active;

        pipeline.mark_flushed();
        let chunk_count = pipeline.chunk_count();
        let finalized = pipeline.finalize();
        streams.release();

        let artifact = match finalized {
            Ok(artifact) => artifact,
            Err(e) => return Err(self.fail(e)),
        };

        let (stop_reason, elapsed_at_stop) = stop.unwrap_or((StopReason::EncoderStopped, 0));
        let summary = RecordingSummary {
            stop_reason,
            elapsed_at_stop,
            duration_secs: clock.elapsed_secs(),
            chunk_count,
            bytes: artifact.len(),
        };
        tracing::info!(
            ?stop_reason,
            elapsed_at_stop,
            duration_secs = summary.duration_secs,
            chunk_count,
            bytes = summary.bytes,
            "Recording ready"
        );

        self.summary = Some(summary);
        self.artifact = Some(Arc::new(artifact));
        self.transition(SessionState::Previewing);
        Ok(())
    }

    /// Any state -> Failed. Releases whatever the recording still holds.
    fn fail(&mut self, error: CaptureError) -> CaptureError {
        self.timebase.stop();
        if let Some(mut active) = self.active.take() {
            if let Some(deadline) = active.deadline.take() {
                deadline.cancel();
            }
            active.streams.release();
        }
        if let Some(previous) = self.superseded.take() {
            tracing::info!("Kept previous recording after failed start");
            self.artifact = Some(previous);
        }
        tracing::warn!(error = %error, "Capture session failed");
        self.last_error = Some(error.to_string());
        self.transition(SessionState::Failed);
        error
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.state, to = ?next, generation = self.generation, "Session transition");
        self.state = next;
    }
}
