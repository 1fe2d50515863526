//! Cancellation and retry plumbing shared by the long-running phases.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

/// Per-transaction timeout.
pub const TRANSACTION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Per-country wall-clock budget.
pub const COUNTRY_BUDGET: Duration = Duration::from_secs(30 * 60);

/// Cooperative cancel flag, checked at batch boundaries.
///
/// An in-flight batch always runs to completion (or rolls back); the flag
/// only prevents the next batch from starting.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Arm the flag on SIGINT. The first Ctrl-C requests a graceful stop;
    /// the process exits once the current batch completes and the progress
    /// file has been flushed.
    pub fn install_sigint_handler(&self) {
        let flag = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Cancellation requested; finishing current batch");
                flag.cancel();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_roundtrip() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
