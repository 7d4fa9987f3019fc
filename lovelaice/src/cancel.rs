//! Cooperative cancellation of a running turn.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::debug;

use crate::error::EngineError;

/// Shared flag checked at every suspension point of a turn.
///
/// Cloning yields a handle to the same flag. Nothing is interrupted
/// mid-operation: a completion call, prompt or subprocess that already started
/// runs to completion and the next checkpoint stops the turn.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear a pending cancellation before a new turn starts.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Fail with [`EngineError::Cancelled`] if cancellation was requested.
    pub fn checkpoint(&self, at: &str) -> Result<()> {
        if self.is_cancelled() {
            debug!(at, "turn cancelled");
            return Err(EngineError::Cancelled.into());
        }
        Ok(())
    }

    /// Set this token on SIGINT.
    ///
    /// A second SIGINT while the token is still set terminates the process
    /// with exit code 130, so an idle prompt can still be interrupted.
    pub fn install_sigint_handler(&self) -> Result<()> {
        use signal_hook::consts::SIGINT;
        use signal_hook::flag;

        flag::register_conditional_shutdown(SIGINT, 130, Arc::clone(&self.flag))
            .context("register SIGINT shutdown")?;
        flag::register(SIGINT, Arc::clone(&self.flag)).context("register SIGINT flag")?;
        Ok(())
    }
}
