//! Exclusive access to capture hardware.
//!
//! Recording and screenshot capture share one [`CaptureSlot`]; whichever
//! claims it first holds the display until its [`SlotGuard`] drops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CaptureSlot {
    busy: Arc<AtomicBool>,
}

impl CaptureSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or `None` if another capture holds it.
    pub fn try_claim(&self) -> Option<SlotGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of holding the capture slot. Frees it on drop.
#[derive(Debug)]
pub struct SlotGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
