//! Shopper session: one cart and one wishlist bound to the current identity.
//!
//! [`Basket`] is the only entry point for intents. Each intent method runs the
//! optimistic step synchronously, then spawns the remote request and its
//! reconciliation as one Tokio task and returns a [`MutationTask`] handle.
//! The request is sent whether or not the handle is awaited.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};

use pineapple_basket_core::{
    Collection, CollectionKind, ErrorKind, ProductId, ProductSnapshot, Totals,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SnapshotCache;
use crate::config::EngineConfig;
use crate::error::add_breadcrumb;
use crate::hydrate::{Hydration, HydrationLoader};
use crate::optimistic::Intent;
use crate::reconcile::{Outcome, ReconcileOrdering, Reconciler};
use crate::remote::{self, Credential, Transport};
use crate::store::{CollectionStore, RequestTicket, StoreState};

/// The signed-in shopper's cart and wishlist.
///
/// This struct is cheaply cloneable via `Arc`; clones share the same stores.
pub struct Basket<T> {
    inner: Arc<BasketInner<T>>,
}

struct BasketInner<T> {
    transport: T,
    credential: RwLock<Option<Credential>>,
    cart: CollectionStore,
    wishlist: CollectionStore,
    cache: SnapshotCache,
    ordering: ReconcileOrdering,
}

impl<T> Clone for Basket<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Basket<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Basket")
            .field("cart", &self.inner.cart)
            .field("wishlist", &self.inner.wishlist)
            .field("ordering", &self.inner.ordering)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Basket<T> {
    /// Create a basket. Signed in if the configuration carries a token.
    #[must_use]
    pub fn new(transport: T, config: &EngineConfig) -> Self {
        Self {
            inner: Arc::new(BasketInner {
                transport,
                credential: RwLock::new(config.api_token.clone().map(Credential::from)),
                cart: CollectionStore::new(CollectionKind::Cart),
                wishlist: CollectionStore::new(CollectionKind::Wishlist),
                cache: SnapshotCache::new(&config.snapshot_cache),
                ordering: config.reconcile_ordering,
            }),
        }
    }

    /// Handle for the cart.
    #[must_use]
    pub fn cart(&self) -> CollectionHandle<T> {
        self.collection(CollectionKind::Cart)
    }

    /// Handle for the wishlist.
    #[must_use]
    pub fn wishlist(&self) -> CollectionHandle<T> {
        self.collection(CollectionKind::Wishlist)
    }

    #[must_use]
    pub fn collection(&self, kind: CollectionKind) -> CollectionHandle<T> {
        CollectionHandle {
            inner: Arc::clone(&self.inner),
            kind,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.current_credential().is_some()
    }

    /// Sign a shopper in.
    ///
    /// Any previous identity is signed out first so the new one never
    /// inherits its collections.
    pub fn login(&self, credential: Credential) {
        let mut current = self
            .inner
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if current.take().is_some() {
            self.inner.reset_all();
            info!("previous shopper signed out, collections reset");
        }
        *current = Some(credential);
        drop(current);
        add_breadcrumb("session", "Signed in", None);
        info!("shopper signed in");
    }

    /// Sign the shopper out and reset both collections.
    ///
    /// Requests still in flight settle into nothing.
    pub fn logout(&self) {
        let mut current = self
            .inner
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = None;
        self.inner.reset_all();
        drop(current);
        add_breadcrumb("session", "Signed out", None);
        info!("shopper signed out, collections reset");
    }

    /// Hydrate cart and wishlist concurrently.
    pub async fn hydrate_all(&self) -> (Hydration, Hydration) {
        let cart = self.cart();
        let wishlist = self.wishlist();
        tokio::join!(cart.hydrate(), wishlist.hydrate())
    }
}

impl<T> BasketInner<T> {
    const fn store(&self, kind: CollectionKind) -> &CollectionStore {
        match kind {
            CollectionKind::Cart => &self.cart,
            CollectionKind::Wishlist => &self.wishlist,
        }
    }

    fn current_credential(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The credential together with the store epoch it belongs to.
    ///
    /// Sign-in and sign-out reset the stores while holding the write lock,
    /// so the pair read here is always consistent.
    fn identity(&self, kind: CollectionKind) -> Option<(Credential, u64)> {
        let credential = self.credential.read().unwrap_or_else(PoisonError::into_inner);
        let epoch = self.store(kind).epoch();
        credential.clone().map(|credential| (credential, epoch))
    }

    /// Caller holds the credential write lock.
    fn reset_all(&self) {
        for kind in CollectionKind::ALL {
            self.store(kind).reset_collection();
        }
        self.cache.clear();
    }
}

impl<T: Transport> BasketInner<T> {
    /// Remote request plus reconciliation for one intent.
    async fn complete(
        &self,
        kind: CollectionKind,
        intent: Intent,
        ticket: RequestTicket,
        credential: Credential,
    ) -> Outcome {
        let store = self.store(kind);
        let request = intent.remote_request(kind);
        let result = remote::issue(&self.transport, kind, &request, &credential).await;
        Reconciler::new(store, &self.transport, &self.cache, self.ordering)
            .settle(&ticket, request.name(), result, &credential)
            .await
    }
}

/// Intents and reads for one collection of a [`Basket`].
pub struct CollectionHandle<T> {
    inner: Arc<BasketInner<T>>,
    kind: CollectionKind,
}

impl<T> Clone for CollectionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            kind: self.kind,
        }
    }
}

impl<T> std::fmt::Debug for CollectionHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("kind", &self.kind)
            .field("store", self.inner.store(self.kind))
            .finish()
    }
}

impl<T: Transport> CollectionHandle<T> {
    #[must_use]
    pub const fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Add a product, incrementing an existing cart line.
    ///
    /// `snapshot` is whatever product data the caller already has; without
    /// one, the last server-provided data for the product is used.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Unauthenticated`] without touching local state
    /// when nobody is signed in.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn add(
        &self,
        id: impl Into<ProductId>,
        quantity: u32,
        snapshot: Option<ProductSnapshot>,
    ) -> Result<MutationTask, ErrorKind> {
        let id = id.into();
        let snapshot = self.inner.cache.provisional_for(&id, snapshot);
        self.dispatch(Intent::Add {
            id,
            quantity,
            snapshot,
        })
    }

    /// Remove a product. Removing an absent product is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Unauthenticated`] when nobody is signed in.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn remove(&self, id: impl Into<ProductId>) -> Result<MutationTask, ErrorKind> {
        self.dispatch(Intent::Remove { id: id.into() })
    }

    /// Set a line's quantity; zero or less removes it.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Unauthenticated`] when nobody is signed in.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn set_quantity(
        &self,
        id: impl Into<ProductId>,
        quantity: i64,
    ) -> Result<MutationTask, ErrorKind> {
        self.dispatch(Intent::SetQuantity {
            id: id.into(),
            quantity,
        })
    }

    /// Apply an intent locally and spawn its remote request.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Unauthenticated`] when nobody is signed in.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn dispatch(&self, intent: Intent) -> Result<MutationTask, ErrorKind> {
        let kind = self.kind;
        let Some((credential, epoch)) = self.inner.identity(kind) else {
            debug!(%kind, intent = intent.name(), "intent refused: not signed in");
            return Err(ErrorKind::Unauthenticated);
        };

        let store = self.inner.store(kind);
        let Some((ticket, changed)) =
            store.begin_request(epoch, intent.product(), |entries| intent.apply(kind, entries))
        else {
            debug!(%kind, intent = intent.name(), "intent refused: signed out meanwhile");
            return Err(ErrorKind::Unauthenticated);
        };

        add_breadcrumb(
            kind.path_segment(),
            intent.name(),
            Some(&[("product_id", intent.product().as_str())]),
        );
        debug!(
            %kind,
            intent = intent.name(),
            product_id = %intent.product(),
            changed,
            sequence = ticket.sequence(),
            "optimistic update applied"
        );

        let inner = Arc::clone(&self.inner);
        let handle =
            tokio::spawn(async move { inner.complete(kind, intent, ticket, credential).await });
        Ok(MutationTask { handle })
    }

    /// Hydrate this collection unless already hydrated or hydrating.
    pub async fn hydrate(&self) -> Hydration {
        let credential = self.inner.current_credential();
        HydrationLoader::new(
            self.store(),
            &self.inner.transport,
            &self.inner.cache,
            self.inner.ordering,
        )
        .hydrate(credential.as_ref())
        .await
    }

    fn store(&self) -> &CollectionStore {
        self.inner.store(self.kind)
    }

    #[must_use]
    pub fn current_entries(&self) -> Collection {
        self.store().current_entries()
    }

    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.store().is_hydrated()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.store().is_loading()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.store().last_error()
    }

    #[must_use]
    pub fn totals(&self) -> Totals {
        self.store().totals()
    }

    #[must_use]
    pub fn snapshot(&self) -> StoreState {
        self.store().snapshot()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.store().subscribe()
    }

    /// Dismiss the last error after it has been shown.
    pub fn clear_error(&self) {
        self.store().clear_error();
    }
}

/// Handle to a spawned mutation.
///
/// Awaiting yields the [`Outcome`]. Dropping the handle does not cancel the
/// request; it still runs and reconciles.
#[derive(Debug)]
#[must_use = "dropping a MutationTask detaches it; await it to observe the outcome"]
pub struct MutationTask {
    handle: JoinHandle<Outcome>,
}

impl MutationTask {
    /// Let the mutation finish in the background.
    pub fn detach(self) {
        drop(self.handle);
    }
}

impl Future for MutationTask {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| {
            joined.unwrap_or_else(|e| {
                tracing::error!(error = %e, "mutation task did not complete");
                Outcome::Aborted
            })
        })
    }
}
