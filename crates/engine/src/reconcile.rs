//! Reconciler: binds a settled request back into its store.
//!
//! On success the store's entries are replaced wholesale by the server's
//! snapshot; nothing is merged. On failure the optimistic change is *not*
//! inverted (that is unsound once intents interleave). The error is recorded
//! and ground truth is re-fetched instead.
//!
//! # Overlapping requests
//!
//! Responses may settle in any order. With [`ReconcileOrdering::SettleOrder`]
//! the last response to settle wins, even if it answers an older request.
//! [`ReconcileOrdering::IssueOrder`] tags each request with a sequence number
//! and drops a successful response when a newer request for the same product
//! has already been reconciled. A hydration snapshot is dropped the same way
//! once any mutation issued after the fetch has been reconciled.

use core::fmt;
use core::str::FromStr;

use pineapple_basket_core::{Collection, ErrorKind};
use tracing::debug;

use crate::cache::SnapshotCache;
use crate::error::report_failure;
use crate::hydrate::{Hydration, HydrationLoader};
use crate::remote::{Credential, Transport};
use crate::store::{CollectionStore, RequestTicket, Settlement};

/// Error returned when an ordering name cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown reconcile ordering: {0} (expected `settle` or `issue`)")]
pub struct ParseOrderingError(String);

/// Which response wins when requests for the same product overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileOrdering {
    /// The last response to settle wins.
    #[default]
    SettleOrder,
    /// The response to the most recently issued request wins.
    IssueOrder,
}

impl fmt::Display for ReconcileOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SettleOrder => f.write_str("settle"),
            Self::IssueOrder => f.write_str("issue"),
        }
    }
}

impl FromStr for ReconcileOrdering {
    type Err = ParseOrderingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "settle" => Ok(Self::SettleOrder),
            "issue" => Ok(Self::IssueOrder),
            other => Err(ParseOrderingError(other.to_string())),
        }
    }
}

/// How a mutation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The server snapshot replaced local entries.
    Reconciled,
    /// A newer request for the same product had already been reconciled.
    Stale,
    /// The shopper signed out before the request settled.
    Discarded,
    /// The request failed; local state was re-fetched from the server.
    RolledBack {
        error: ErrorKind,
        hydration: Hydration,
    },
    /// The task running the request panicked or was cancelled.
    Aborted,
}

/// Consumes the result of one remote request.
pub struct Reconciler<'a, T> {
    store: &'a CollectionStore,
    transport: &'a T,
    cache: &'a SnapshotCache,
    ordering: ReconcileOrdering,
}

impl<'a, T: Transport> Reconciler<'a, T> {
    #[must_use]
    pub const fn new(
        store: &'a CollectionStore,
        transport: &'a T,
        cache: &'a SnapshotCache,
        ordering: ReconcileOrdering,
    ) -> Self {
        Self {
            store,
            transport,
            cache,
            ordering,
        }
    }

    /// Bind a settled request into the store.
    pub async fn settle(
        &self,
        ticket: &RequestTicket,
        operation: &'static str,
        result: Result<Collection, ErrorKind>,
        credential: &Credential,
    ) -> Outcome {
        let kind = self.store.kind();

        match result {
            Ok(snapshot) => {
                let cached = snapshot.clone();
                match self.store.replace_entries(ticket, snapshot, self.ordering) {
                    Settlement::Applied => {
                        self.cache.remember(&cached);
                        debug!(%kind, operation, sequence = ticket.sequence(), "reconciled");
                        Outcome::Reconciled
                    }
                    Settlement::Stale => {
                        debug!(%kind, operation, sequence = ticket.sequence(), "stale response dropped");
                        Outcome::Stale
                    }
                    Settlement::Discarded => Outcome::Discarded,
                }
            }
            Err(error) => {
                if self.store.fail_request(ticket, error.clone()) == Settlement::Discarded {
                    debug!(%kind, operation, %error, "failure after sign-out ignored");
                    return Outcome::Discarded;
                }
                report_failure(kind, operation, &error);
                let hydration =
                    HydrationLoader::new(self.store, self.transport, self.cache, self.ordering)
                        .rehydrate(Some(credential))
                        .await;
                Outcome::RolledBack { error, hydration }
            }
        }
    }
}
