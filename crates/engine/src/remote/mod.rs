//! Remote Mutator: one network request per intent.
//!
//! # Architecture
//!
//! - [`Transport`] is the request/response boundary. It never touches a store.
//! - [`HttpTransport`] talks to the collection server over HTTPS with `reqwest`.
//! - [`issue`] runs one request and turns the reply into an authoritative
//!   [`Collection`], or an [`ErrorKind`] for the reconciler.
//!
//! Every endpoint answers with the *full* collection, never a delta, which is
//! what lets the reconciler replace local state wholesale.
//!
//! No retries happen here. A failed request is reported once and recovery is
//! left to the reconciler's corrective re-hydration.

mod http;

use std::future::Future;

use pineapple_basket_core::{Collection, CollectionKind, ErrorKind, ProductId, WireEntry};
use secrecy::{ExposeSecret, SecretString};
use tracing::{instrument, warn};

pub use http::{HttpTransport, REQUEST_ID_HEADER};

use crate::error::TransportError;

/// Opaque bearer credential for the signed-in shopper.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    /// Wrap a bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// The raw token, for attaching to a request.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<SecretString> for Credential {
    fn from(secret: SecretString) -> Self {
        Self(secret)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// A request against the collection server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteRequest {
    /// `GET {kind}`
    Fetch,
    /// `POST {kind}/add {id, quantity}`
    Add { id: ProductId, quantity: u32 },
    /// `PUT {kind}/{id} {quantity}`
    UpdateQuantity { id: ProductId, quantity: u32 },
    /// `DELETE {kind}/{id}`
    Remove { id: ProductId },
}

impl RemoteRequest {
    /// Short name for logs and Sentry tags.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Add { .. } => "add",
            Self::UpdateQuantity { .. } => "update_quantity",
            Self::Remove { .. } => "remove",
        }
    }

    /// Product the request mutates, `None` for a fetch.
    #[must_use]
    pub const fn product(&self) -> Option<&ProductId> {
        match self {
            Self::Fetch => None,
            Self::Add { id, .. } | Self::UpdateQuantity { id, .. } | Self::Remove { id } => {
                Some(id)
            }
        }
    }
}

/// Issues requests against the collection server.
///
/// Implementations resolve to the server's full collection on success.
pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        kind: CollectionKind,
        request: &RemoteRequest,
        credential: &Credential,
    ) -> impl Future<Output = Result<Vec<WireEntry>, TransportError>> + Send;
}

/// Issue one request and convert the reply into an authoritative collection.
///
/// # Errors
///
/// Returns the [`ErrorKind`] the transport failure maps to.
#[instrument(skip(transport, request, credential), fields(kind = %kind, request = request.name()))]
pub async fn issue<T: Transport>(
    transport: &T,
    kind: CollectionKind,
    request: &RemoteRequest,
    credential: &Credential,
) -> Result<Collection, ErrorKind> {
    match transport.execute(kind, request, credential).await {
        Ok(wire) => Ok(into_collection(kind, wire)),
        Err(e) => {
            warn!(error = %e, "collection request failed");
            Err(e.into())
        }
    }
}

/// Build a reconciled collection from wire entries, preserving server order.
///
/// Duplicate ids keep their first occurrence; zero-quantity cart lines are
/// dropped. Both are server bugs and are logged.
#[must_use]
pub fn into_collection(kind: CollectionKind, wire: Vec<WireEntry>) -> Collection {
    let mut collection = Collection::new();
    for entry in wire {
        let id = entry.id.clone();
        match entry.into_entry(kind) {
            Some(entry) => {
                if !collection.push_unique(entry) {
                    warn!(%kind, product_id = %id, "duplicate entry in server snapshot");
                }
            }
            None => warn!(%kind, product_id = %id, "zero-quantity line in server snapshot"),
        }
    }
    collection
}
