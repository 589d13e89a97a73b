//! Hydration Loader: fetch the authoritative collection into a store.

use pineapple_basket_core::ErrorKind;
use tracing::{debug, info};

use crate::cache::SnapshotCache;
use crate::error::report_failure;
use crate::reconcile::ReconcileOrdering;
use crate::remote::{self, Credential, RemoteRequest, Transport};
use crate::store::{CollectionStore, Settlement};

/// Result of a hydration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hydration {
    /// The server snapshot was fed into the store.
    Hydrated,
    /// Already hydrated, or a hydration was already in flight.
    Skipped,
    /// The store was reset while the fetch was in flight, or (under
    /// [`ReconcileOrdering::IssueOrder`]) a newer mutation had already been
    /// reconciled.
    Discarded,
    /// The fetch failed; the error is the store's `last_error`.
    Failed(ErrorKind),
}

/// Loads a collection's authoritative snapshot into its store.
pub struct HydrationLoader<'a, T> {
    store: &'a CollectionStore,
    transport: &'a T,
    cache: &'a SnapshotCache,
    ordering: ReconcileOrdering,
}

impl<'a, T: Transport> HydrationLoader<'a, T> {
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

    /// Hydrate once: no-op when already hydrated or a hydration is in flight.
    pub async fn hydrate(&self, credential: Option<&Credential>) -> Hydration {
        self.load(credential, false).await
    }

    /// Re-fetch ground truth even if already hydrated.
    ///
    /// Still skipped when a hydration is already in flight, since that fetch
    /// will deliver the same ground truth.
    pub async fn rehydrate(&self, credential: Option<&Credential>) -> Hydration {
        self.load(credential, true).await
    }

    async fn load(&self, credential: Option<&Credential>, force: bool) -> Hydration {
        let kind = self.store.kind();

        let Some(credential) = credential else {
            if !force && self.store.is_hydrated() {
                return Hydration::Skipped;
            }
            report_failure(kind, "fetch", &ErrorKind::Unauthenticated);
            self.store.record_error(ErrorKind::Unauthenticated);
            return Hydration::Failed(ErrorKind::Unauthenticated);
        };

        let Some(ticket) = self.store.begin_hydration(force) else {
            debug!(%kind, force, "hydration skipped");
            return Hydration::Skipped;
        };

        match remote::issue(self.transport, kind, &RemoteRequest::Fetch, credential).await {
            Ok(snapshot) => {
                let count = snapshot.len();
                let cached = snapshot.clone();
                match self.store.hydrate_collection(&ticket, snapshot, self.ordering) {
                    Settlement::Applied => {
                        self.cache.remember(&cached);
                        info!(%kind, entries = count, "collection hydrated");
                        Hydration::Hydrated
                    }
                    Settlement::Stale => {
                        debug!(
                            %kind,
                            sequence = ticket.sequence(),
                            "hydration overtaken by a newer mutation"
                        );
                        Hydration::Discarded
                    }
                    Settlement::Discarded => {
                        debug!(%kind, "hydration response discarded after reset");
                        Hydration::Discarded
                    }
                }
            }
            Err(error) => {
                report_failure(kind, "fetch", &error);
                match self.store.fail_hydration(&ticket, error.clone()) {
                    Settlement::Applied => Hydration::Failed(error),
                    Settlement::Stale | Settlement::Discarded => Hydration::Discarded,
                }
            }
        }
    }
}
