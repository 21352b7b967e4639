//! Interrupt-shared receive flags.
//!
//! This is the only state touched from interrupt context. The handler sets a
//! flag and returns; all decoding happens later on the main loop. At most one
//! pending frame is represented: a second interrupt before the first is
//! drained only raises `duplicate_suspected`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct FlagState {
    frame_ready: AtomicBool,
    interrupts_enabled: AtomicBool,
    duplicate_suspected: AtomicBool,
}

/// Receive flags shared between the radio interrupt and the main loop.
///
/// Cloning yields another handle to the same flags.
#[derive(Debug, Clone)]
pub struct InterruptFlags {
    inner: Arc<FlagState>,
}

impl Default for InterruptFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptFlags {
    /// Create flags with interrupts enabled and nothing pending.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FlagState {
                frame_ready: AtomicBool::new(false),
                interrupts_enabled: AtomicBool::new(true),
                duplicate_suspected: AtomicBool::new(false),
            }),
        }
    }

    /// Interrupt handler body. Safe to call from ISR context.
    pub fn on_interrupt(&self) {
        let enabled = self.inner.interrupts_enabled.load(Ordering::Acquire);
        if self.inner.frame_ready.load(Ordering::Acquire) || !enabled {
            self.inner.duplicate_suspected.store(true, Ordering::Release);
        }
        if !enabled {
            return;
        }
        self.inner.frame_ready.store(true, Ordering::Release);
    }

    /// Consume the pending-frame flag. Returns whether a frame was pending.
    pub fn take_frame_ready(&self) -> bool {
        self.inner.frame_ready.swap(false, Ordering::AcqRel)
    }

    /// Whether a frame is pending (without consuming it).
    pub fn frame_ready(&self) -> bool {
        self.inner.frame_ready.load(Ordering::Acquire)
    }

    /// Stop the interrupt from flagging new frames.
    pub fn disable(&self) {
        self.inner.interrupts_enabled.store(false, Ordering::Release);
    }

    /// Let the interrupt flag new frames again.
    pub fn enable(&self) {
        self.inner.interrupts_enabled.store(true, Ordering::Release);
    }

    /// Whether the interrupt is currently allowed to flag frames.
    pub fn interrupts_enabled(&self) -> bool {
        self.inner.interrupts_enabled.load(Ordering::Acquire)
    }

    /// Consume the duplicate-interrupt marker.
    pub fn take_duplicate_suspected(&self) -> bool {
        self.inner.duplicate_suspected.swap(false, Ordering::AcqRel)
    }

    /// Whether a duplicate/noisy interrupt has been seen since the last frame.
    pub fn duplicate_suspected(&self) -> bool {
        self.inner.duplicate_suspected.load(Ordering::Acquire)
    }
}
