//! Process-wide cooperative cancellation.
//!
//! A single `ShutdownFlag` is created at startup and handed to every
//! component that needs to observe shutdown: the event loop checks it
//! between tasks, the agent loop between reasoning iterations.  Signal
//! handlers only ever call [`ShutdownFlag::trigger`]; all teardown
//! happens on the owning task at its next check.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable shutdown flag.  Clones share state.
#[derive(Clone, Default)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.  Idempotent.
    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_is_idempotent_and_shared() {
        let flag = ShutdownFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_triggered());

        flag.trigger();
        flag.trigger();
        assert!(clone.is_triggered());
    }
}
