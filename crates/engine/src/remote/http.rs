//! HTTP transport for the collection server.
//!
//! Endpoints, relative to the configured base URL:
//!
//! | Request | Method | Path | Body |
//! |---------|--------|------|------|
//! | fetch | `GET` | `{kind}` | - |
//! | add | `POST` | `{kind}/add` | `{"id", "quantity"}` |
//! | update quantity | `PUT` | `{kind}/{id}` | `{"quantity"}` |
//! | remove | `DELETE` | `{kind}/{id}` | - |
//!
//! Every endpoint answers `{"success": bool, "entries": [...], "message"?: string}`.

use std::sync::Arc;

use pineapple_basket_core::{CollectionKind, ProductId, WireEntry};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use super::{Credential, RemoteRequest, Transport};
use crate::config::EngineConfig;
use crate::error::TransportError;

/// The HTTP header carrying a per-request correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Max response body characters included in logs.
const LOG_BODY_LIMIT: usize = 500;

/// Body of `POST {kind}/add`.
#[derive(Debug, Serialize)]
struct AddBody<'a> {
    id: &'a ProductId,
    quantity: u32,
}

/// Body of `PUT {kind}/{id}`.
#[derive(Debug, Serialize)]
struct QuantityBody {
    quantity: u32,
}

/// Response of every collection endpoint.
#[derive(Debug, Deserialize)]
struct CollectionResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    entries: Vec<WireEntry>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the collection server.
///
/// Cheaply cloneable; clones share one connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpTransportInner>,
}

struct HttpTransportInner {
    client: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport from engine configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &EngineConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config.api_base_url.clone()))
    }

    /// Create a transport around an existing `reqwest` client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self {
            inner: Arc::new(HttpTransportInner { client, base_url }),
        }
    }

    /// Build `{base}/{kind}/{tail...}`, percent-encoding each segment.
    fn endpoint(&self, kind: CollectionKind, tail: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.inner.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| TransportError::InvalidEndpoint(self.inner.base_url.to_string()))?;
            segments.pop_if_empty().push(kind.path_segment()).extend(tail);
        }
        Ok(url)
    }

    fn build_request(
        &self,
        kind: CollectionKind,
        request: &RemoteRequest,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let client = &self.inner.client;
        let builder = match request {
            RemoteRequest::Fetch => client.get(self.endpoint(kind, &[])?),
            RemoteRequest::Add { id, quantity } => client
                .post(self.endpoint(kind, &["add"])?)
                .json(&AddBody {
                    id,
                    quantity: *quantity,
                }),
            RemoteRequest::UpdateQuantity { id, quantity } => client
                .put(self.endpoint(kind, &[id.as_str()])?)
                .json(&QuantityBody {
                    quantity: *quantity,
                }),
            RemoteRequest::Remove { id } => client.delete(self.endpoint(kind, &[id.as_str()])?),
        };
        Ok(builder)
    }
}

impl Transport for HttpTransport {
    #[instrument(
        skip(self, request, credential),
        fields(kind = %kind, request = request.name(), request_id)
    )]
    async fn execute(
        &self,
        kind: CollectionKind,
        request: &RemoteRequest,
        credential: &Credential,
    ) -> Result<Vec<WireEntry>, TransportError> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let response = self
            .build_request(kind, request)?
            .bearer_auth(credential.expose_secret())
            .header(REQUEST_ID_HEADER, &request_id)
            .send()
            .await?;

        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(TransportError::RateLimited(retry_after));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(TransportError::Unauthorized);
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            // A declined request usually still carries the server's reason
            if status.is_client_error()
                && let Ok(body) = serde_json::from_str::<CollectionResponse>(&response_text)
                && let Some(message) = body.message
            {
                return Err(TransportError::Rejected(message));
            }

            tracing::error!(
                status = %status,
                body = %truncate(&response_text, LOG_BODY_LIMIT),
                "Collection server returned non-success status"
            );
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate(&response_text, 200),
            });
        }

        let body: CollectionResponse = match serde_json::from_str(&response_text) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %truncate(&response_text, LOG_BODY_LIMIT),
                    "Failed to parse collection response"
                );
                return Err(TransportError::Parse(e));
            }
        };

        if !body.success {
            let reason = body
                .message
                .unwrap_or_else(|| "Request declined by server".to_string());
            tracing::debug!(reason = %reason, "collection request declined");
            return Err(TransportError::Rejected(reason));
        }

        Ok(body.entries)
    }
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
