//! Recording timers: the 1 Hz elapsed counter and the one-shot auto-stop
//! deadline.
//!
//! Both timers run as tokio tasks that only post events; the counter itself
//! is advanced by the session when it applies a [`SessionEvent::Tick`].

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::events::{EventSender, SessionEvent};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Whole seconds of recording time.
///
/// Reset on start, advanced by ticks while running, frozen once stopped.
#[derive(Debug, Default)]
pub struct Timebase {
    elapsed: u64,
    ticker: Option<JoinHandle<()>>,
}

impl Timebase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to zero and start posting ticks.
    pub fn start(&mut self, events: EventSender) {
        self.stop();
        self.elapsed = 0;
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !events.send(SessionEvent::Tick) {
                    break;
                }
            }
        }));
    }

    /// Apply one tick. Ignored once stopped.
    pub fn tick(&mut self) {
        if self.is_running() {
            self.elapsed += 1;
        }
    }

    /// Stop ticking; the count stays where it is.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }
}

impl Drop for Timebase {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One-shot auto-stop timer. Aborted when cancelled or dropped.
#[derive(Debug)]
pub struct DeadlineTimer {
    task: JoinHandle<()>,
}

impl DeadlineTimer {
    /// Post [`SessionEvent::DeadlineElapsed`] once `after` has passed.
    pub fn arm(after: Duration, events: EventSender) -> Self {
        let task = tokio::spawn(async move {
            time::sleep(after).await;
            tracing::info!(after_secs = after.as_secs(), "Auto-stop deadline reached");
            events.send(SessionEvent::DeadlineElapsed);
        });
        Self { task }
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
