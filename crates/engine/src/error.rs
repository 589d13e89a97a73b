//! Transport errors and Sentry reporting helpers.
//!
//! Transport failures never escape the engine: the reconciler converts them
//! into an [`ErrorKind`] stored as the collection's `last_error`, reports
//! them to Sentry, and re-hydrates.

use pineapple_basket_core::{CollectionKind, ErrorKind};
use thiserror::Error;

/// Errors that can occur when talking to the collection server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid JSON for the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Server answered with a non-success status and no usable reason.
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// Server processed the request and declined it.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Rate limited by the server.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Server did not accept the bearer credential.
    #[error("Credential rejected by server")]
    Unauthorized,

    /// Endpoint URL could not be built from the configured base URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl From<TransportError> for ErrorKind {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rejected(reason) => Self::ServerRejected { reason },
            TransportError::Status { status, .. } if (400..500).contains(&status) => {
                Self::ServerRejected {
                    reason: format!("Request declined (HTTP {status})"),
                }
            }
            TransportError::Unauthorized => Self::Unauthenticated,
            TransportError::Parse(_) => {
                Self::NetworkFailure("malformed response from server".to_string())
            }
            other => Self::NetworkFailure(other.to_string()),
        }
    }
}

/// Report a failed request to Sentry and the log.
///
/// Unauthenticated failures are expected (signed-out shoppers) and only logged.
pub fn report_failure(kind: CollectionKind, operation: &str, error: &ErrorKind) {
    if matches!(error, ErrorKind::Unauthenticated) {
        tracing::info!(%kind, operation, "collection request without a credential");
        return;
    }

    let event_id = sentry::with_scope(
        |scope| {
            scope.set_tag("collection", kind.path_segment());
            scope.set_tag("operation", operation);
        },
        || sentry::capture_error(error),
    );
    tracing::warn!(
        %kind,
        operation,
        error = %error,
        sentry_event_id = %event_id,
        "collection request failed"
    );
}

/// Add a breadcrumb for a shopper intent.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of intents
/// leading up to a failed reconciliation.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_keeps_server_reason() {
        let kind = ErrorKind::from(TransportError::Rejected("Out of stock".to_string()));
        assert_eq!(
            kind,
            ErrorKind::ServerRejected {
                reason: "Out of stock".to_string()
            }
        );
    }

    #[test]
    fn test_client_status_is_rejection_server_status_is_network() {
        let client = ErrorKind::from(TransportError::Status {
            status: 409,
            body: String::new(),
        });
        assert!(matches!(client, ErrorKind::ServerRejected { .. }));

        let server = ErrorKind::from(TransportError::Status {
            status: 503,
            body: "upstream".to_string(),
        });
        assert!(matches!(server, ErrorKind::NetworkFailure(_)));
    }

    #[test]
    fn test_rate_limit_is_network_failure() {
        let kind = ErrorKind::from(TransportError::RateLimited(30));
        assert_eq!(
            kind,
            ErrorKind::NetworkFailure("Rate limited, retry after 30 seconds".to_string())
        );
    }

    #[test]
    fn test_unauthorized_maps_to_unauthenticated() {
        assert_eq!(
            ErrorKind::from(TransportError::Unauthorized),
            ErrorKind::Unauthenticated
        );
    }

    #[test]
    fn test_reporting_without_sentry_client_is_noop() {
        report_failure(
            CollectionKind::Cart,
            "add",
            &ErrorKind::NetworkFailure("timeout".to_string()),
        );
        add_breadcrumb("cart", "add", Some(&[("product_id", "P1")]));
    }
}
