//! Progress reporting and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives progress from the engine and tells it whether to stop.
///
/// Cancellation is only observed between operands and between phases.
pub trait ProgressMonitor {
    fn begin(&self, _name: &str, _total_work: u64) {}
    fn subtask(&self, _name: &str) {}
    fn worked(&self, _work: u64) {}
    fn done(&self) {}
    fn is_cancelled(&self) -> bool {
        false
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressMonitor;

impl ProgressMonitor for NullProgressMonitor {}

/// A shareable cancel switch. See [`crate::install_signal_handler`].
#[derive(Debug, Default, Clone)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl ProgressMonitor for CancellationFlag {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_flag_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let seen_by_engine = flag.clone();
        assert!(!seen_by_engine.is_cancelled());
        flag.cancel();
        assert!(seen_by_engine.is_cancelled());
    }

    #[test]
    fn null_monitor_never_cancels() {
        let monitor = NullProgressMonitor;
        monitor.begin("run", 10);
        monitor.worked(10);
        monitor.done();
        assert!(!monitor.is_cancelled());
    }
}
