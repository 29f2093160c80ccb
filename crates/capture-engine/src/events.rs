//! Messages that drive the capture session state machine.
//!
//! Timers, stream observers, and encoder callbacks never touch session state
//! directly. They post a [`SessionEvent`] tagged with the recording generation
//! they belong to, and the session applies events one at a time in arrival
//! order.

use tokio::sync::mpsc;

/// An asynchronous occurrence reported to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// One second of recording time has passed.
    Tick,
    /// The auto-stop deadline fired.
    DeadlineElapsed,
    /// The display track ended without being asked to (share revoked).
    TrackEnded,
    /// The encoder produced a chunk of container bytes.
    Chunk(Vec<u8>),
    /// The encoder has flushed its final chunk.
    EncoderFlushed,
    /// The encoder failed after starting.
    EncoderFailed(String),
}

#[derive(Debug)]
pub(crate) struct Envelope {
    pub generation: u64,
    pub event: SessionEvent,
}

pub(crate) type EventReceiver = mpsc::UnboundedReceiver<Envelope>;

/// Posts events for one recording generation into the session's queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    generation: u64,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventSender {
    pub(crate) fn channel() -> (mpsc::UnboundedSender<Envelope>, EventReceiver) {
        mpsc::unbounded_channel()
    }

    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Post an event. Returns `false` once the session is gone.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.tx
            .send(Envelope {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}
