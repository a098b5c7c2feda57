// ============================================================
// Layer 6 — Interrupt Flag
// ============================================================
// A shared flag raised from outside the training loop (Ctrl-C)
// and polled by the loop between steps. A step in flight always
// completes; the loop then stops and returns what it has.
//
// The flag is a cheap clone around Arc<AtomicBool>, so the
// signal handler and the loop each hold their own handle.

use anyhow::{Context, Result};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Clear the flag before the next training run
    pub fn reset(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    /// Route SIGINT to this flag. Only one handler per process.
    pub fn install_ctrlc(&self) -> Result<()> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            flag.raise();
        })
        .context("Failed to install Ctrl-C handler")?;
        tracing::debug!("Ctrl-C handler installed");
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag   = InterruptFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_raised());

        handle.raise();
        assert!(flag.is_raised());

        flag.reset();
        assert!(!handle.is_raised());
    }
}
