//! Completion latch: a one-shot "producer is done" flag.
//!
//! The latch starts unset and is set exactly once per exchange. Setting
//! uses `Release` and reading uses `Acquire`, which orders every channel
//! send that happened before `set()` ahead of any `is_set()` that sees it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared one-shot completion flag.
///
/// Clones observe the same flag; one clone goes to the producer, the other
/// stays with the consumer.
#[derive(Debug, Clone, Default)]
pub struct CompletionLatch {
    done: Arc<AtomicBool>,
}

impl CompletionLatch {
    /// Create a new, unset latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the latch.
    ///
    /// Returns `true` if this call set it, `false` if it was already set.
    pub fn set(&self) -> bool {
        !self.done.swap(true, Ordering::AcqRel)
    }

    /// Check whether the latch has been set.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Create a guard that sets this latch when dropped.
    pub fn guard(&self) -> CompletionGuard {
        CompletionGuard {
            latch: self.clone(),
        }
    }
}

/// Sets its latch on drop, including during unwinding.
///
/// Producers hold one of these for their whole lifetime so that no exit
/// path, error or panic can leave the consumer waiting forever.
#[derive(Debug)]
#[must_use = "dropping the guard immediately signals completion"]
pub struct CompletionGuard {
    latch: CompletionLatch,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.latch.set();
    }
}
