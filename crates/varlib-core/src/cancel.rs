//! Stop signal for load, unload, archive and duplicate-deletion batches.
//!
//! The token is read between items only. A move or delete that has already
//! started finishes, and the batch returns the results gathered so far with
//! its `cancelled` flag set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag for a running batch.
///
/// A host keeps one clone (for a Ctrl-C handler or a UI button) and hands
/// another to the engine. Cancelling either stops the batch before its
/// next item.
///
/// # Example
///
/// ```
/// use varlib_core::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handler = token.clone();
///
/// handler.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the batch before its next item.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// True when a token was supplied and has been cancelled.
    pub fn requested(token: Option<&Self>) -> bool {
        token.is_some_and(Self::is_cancelled)
    }
}
