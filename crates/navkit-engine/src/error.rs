//! Dispatch errors.

use thiserror::Error;

/// Why an external launch did not happen.
///
/// None of these reach the user: the gateway treats every failure as "not
/// intercepted" and lets the navigation continue internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The receiver was uninstalled or disabled after resolution.
    #[error("receiver vanished: {0}")]
    ReceiverVanished(String),

    /// The platform refused the launch (e.g. a malformed receiver manifest).
    #[error("launch rejected: {0}")]
    SecurityRejected(String),
}

impl DispatchError {
    pub fn receiver_vanished(msg: impl Into<String>) -> Self {
        Self::ReceiverVanished(msg.into())
    }

    pub fn security_rejected(msg: impl Into<String>) -> Self {
        Self::SecurityRejected(msg.into())
    }
}
