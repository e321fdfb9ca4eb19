//! Work that must not run inside a navigation callback.
//!
//! Closing the surface or starting a new load while the embedder is still
//! inside its navigation callback is not re-entrant. Such work is posted
//! here and run from [`InterceptGateway::run_deferred`](crate::InterceptGateway::run_deferred).

use serde::Serialize;
use tokio::sync::mpsc;

/// A deferred surface operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeferredAction {
    /// Load `url` in the current surface.
    LoadUrl {
        url: String,
        referrer: Option<String>,
    },
    /// Close the current surface.
    CloseSurface,
}

/// FIFO of deferred actions.
#[derive(Debug)]
pub struct DeferredQueue {
    sender: mpsc::UnboundedSender<DeferredAction>,
    receiver: mpsc::UnboundedReceiver<DeferredAction>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    pub fn post(&self, action: DeferredAction) {
        // The receiver lives as long as the queue, so sending cannot fail.
        let _ = self.sender.send(action);
    }

    /// Everything posted so far, oldest first.
    pub fn drain(&mut self) -> Vec<DeferredAction> {
        std::iter::from_fn(|| self.receiver.try_recv().ok()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for DeferredQueue {
    fn default() -> Self {
        Self::new()
    }
}
