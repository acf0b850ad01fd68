use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter bumped on every state entry.
///
/// Work started under one epoch may only apply its result while that epoch
/// is still current.
#[derive(Debug, Clone, Default)]
pub struct Epoch(Arc<AtomicU64>);

impl Epoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Invalidates everything captured so far and returns the new epoch.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.current() == epoch
    }

    pub fn guard(&self, epoch: u64) -> EpochGuard {
        EpochGuard {
            epoch: self.clone(),
            captured: epoch,
        }
    }
}

/// An epoch captured when a task started.
#[derive(Debug, Clone)]
pub struct EpochGuard {
    epoch: Epoch,
    captured: u64,
}

impl EpochGuard {
    pub fn captured(&self) -> u64 {
        self.captured
    }

    pub fn is_current(&self) -> bool {
        self.epoch.is_current(self.captured)
    }
}
