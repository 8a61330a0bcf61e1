//! Cooperative cancellation for training runs.
//!
//! Model selection can take a while on larger tables (every candidate family
//! is cross-validated once per grid value). A [`CancellationToken`] lets
//! another thread stop it between fits.
//!
//! # Example
//!
//! ```
//! use gradecast_learning::CancellationToken;
//!
//! let token = CancellationToken::new();
//! assert!(token.check().is_ok());
//!
//! token.cancel();
//! assert!(token.check().is_err());
//!
//! token.reset();
//! assert!(!token.is_cancelled());
//! ```

use crate::error::{LearningError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag signalling that a training run should stop.
///
/// Clones share the same flag. The flag is only polled between model fits,
/// so a fit already in progress runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);

impl CancellationToken {
    /// Creates a token in the non-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Visible to every clone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// `Err(LearningError::Cancelled)` once cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::Cancelled`] if [`cancel()`](Self::cancel) was called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(LearningError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Poll an optional token; `None` never cancels.
pub(crate) fn check_cancelled(token: Option<&CancellationToken>) -> Result<()> {
    token.map_or(Ok(()), CancellationToken::check)
}
