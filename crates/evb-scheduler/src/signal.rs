//! Global mutable state for SIGINT/SIGTERM-triggered cleanup, expressed as
//! an owned struct shared via `Arc` rather than process-wide globals
//! (spec.md §9 "Global mutable state for cleanup").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use evb_env::ContainerHandle;

/// Tracks every container a worker currently owns, plus the two flags a
/// signal handler and the normal per-worker cleanup path cooperate through.
#[derive(Clone)]
pub struct CleanupCoordinator {
    active: Arc<Mutex<Vec<ContainerHandle>>>,
    shutdown_requested: Arc<AtomicBool>,
    cleanup_in_progress: Arc<AtomicBool>,
}

impl CleanupCoordinator {
    pub fn new() -> Self {
        Self {
            active: Arc::new(Mutex::new(Vec::new())),
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            cleanup_in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register SIGINT and SIGTERM against the same flag, so either signal
    /// is treated identically and a second signal during cleanup is a no-op
    /// (the flag is already set).
    pub fn install_signal_handlers(&self) -> Result<(), std::io::Error> {
        signal_hook::flag::register(signal_hook::consts::SIGINT, self.shutdown_requested.clone())?;
        signal_hook::flag::register(signal_hook::consts::SIGTERM, self.shutdown_requested.clone())?;
        Ok(())
    }

    pub fn register(&self, handle: ContainerHandle) {
        self.active.lock().unwrap().push(handle);
    }

    pub fn unregister(&self, container_id: &str) {
        self.active.lock().unwrap().retain(|h| h.container_id != container_id);
    }

    pub fn should_stop(&self) -> bool {
        self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Per-worker cleanup becomes a no-op once a global cleanup has claimed
    /// ownership of the shutdown.
    pub fn is_cleanup_in_progress(&self) -> bool {
        self.cleanup_in_progress.load(Ordering::Relaxed)
    }

    /// First caller to see `shutdown_requested` wins the race and receives
    /// `Some(snapshot)` of every still-active container; later callers (or
    /// duplicate signals) receive `None`.
    pub fn claim_global_cleanup(&self) -> Option<Vec<ContainerHandle>> {
        if !self.shutdown_requested.load(Ordering::Relaxed) {
            return None;
        }
        if self.cleanup_in_progress.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(self.active.lock().unwrap().clone())
    }
}

impl Default for CleanupCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
