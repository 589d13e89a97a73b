//! Error kinds surfaced to the UI through a store's `last_error`.

use thiserror::Error;

/// Why a mutation or hydration did not reach the server's state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// No credential is available for the current shopper.
    #[error("Not signed in")]
    Unauthenticated,

    /// The request could not complete (timeout, connectivity, bad gateway).
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// The server received the request and declined it.
    #[error("Rejected by server: {reason}")]
    ServerRejected {
        /// Reason given by the server, shown to the shopper verbatim.
        reason: String,
    },
}

impl ErrorKind {
    /// Message suitable for a transient notification.
    ///
    /// Server rejections surface the server's own reason; network failures
    /// get a generic message so transport details never reach the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Please sign in to continue".to_string(),
            Self::NetworkFailure(_) => {
                "We couldn't reach the store. Your changes were refreshed.".to_string()
            }
            Self::ServerRejected { reason } => reason.clone(),
        }
    }
}
