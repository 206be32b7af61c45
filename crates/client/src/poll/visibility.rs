//! Page-visibility signal.
//!
//! Wraps the "is the surface hidden" boolean in a watch channel so any
//! number of schedulers can react to changes without polling it.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Subscribable visibility flag. Cloning shares the same underlying state.
#[derive(Clone)]
pub struct VisibilitySignal {
    hidden: Arc<watch::Sender<bool>>,
}

impl VisibilitySignal {
    /// New signal reporting a visible surface.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { hidden: Arc::new(tx) }
    }

    /// Report a visibility change. Redundant reports are deduplicated so
    /// subscribers only wake on actual transitions.
    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.send_if_modified(|current| {
            if *current == hidden {
                false
            } else {
                debug!(hidden, "visibility changed");
                *current = hidden;
                true
            }
        });
    }

    /// Current visibility.
    pub fn is_hidden(&self) -> bool {
        *self.hidden.borrow()
    }

    /// Receiver for visibility transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.hidden.subscribe()
    }
}

impl Default for VisibilitySignal {
    fn default() -> Self {
        Self::new()
    }
}
