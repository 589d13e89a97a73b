//! Integration test support for Pineapple Basket.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pineapple-basket-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `basket_flow` - Intents, reconciliation and hydration against [`StubTransport`]
//! - `basket_races` - Overlapping requests settled in a controlled order
//! - `basket_session` - Login, logout and unauthenticated behavior
//! - `http_transport` - [`HttpTransport`] against a `wiremock` server
//!
//! [`HttpTransport`]: pineapple_basket_engine::HttpTransport

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use pineapple_basket_core::{CollectionKind, ProductId, WireEntry};
use pineapple_basket_engine::{
    Basket, Credential, EngineConfig, ReconcileOrdering, RemoteRequest, Transport, TransportError,
};
use rust_decimal::Decimal;
use tokio::sync::oneshot;
use url::Url;

/// Token used by [`signed_in_basket`].
pub const TEST_TOKEN: &str = "test-shopper-token";

// =============================================================================
// Stub Transport
// =============================================================================

/// In-memory collection server.
///
/// Mutations are applied to the server state as soon as a request arrives.
/// A held request keeps the snapshot it produced and returns it only once its
/// [`Gate`] is released, which lets tests choose the settle order.
#[derive(Clone, Default)]
pub struct StubTransport {
    inner: Arc<Mutex<StubState>>,
}

#[derive(Default)]
struct StubState {
    collections: HashMap<CollectionKind, Vec<WireEntry>>,
    prices: HashMap<ProductId, Decimal>,
    failures: VecDeque<Scripted<TransportError>>,
    holds: VecDeque<Scripted<oneshot::Receiver<()>>>,
    calls: Vec<(CollectionKind, RemoteRequest)>,
}

struct Scripted<V> {
    kind: CollectionKind,
    request: &'static str,
    value: V,
}

impl<V> Scripted<V> {
    fn matches(&self, kind: CollectionKind, request: &RemoteRequest) -> bool {
        self.kind == kind && self.request == request.name()
    }
}

/// Releases one held request.
pub struct Gate(oneshot::Sender<()>);

impl Gate {
    /// Let the held response reach the engine.
    pub fn release(self) {
        let _ = self.0.send(());
    }
}

impl StubTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the price the server reports for a product.
    pub fn set_price(&self, id: &str, price: impl Into<Decimal>) {
        self.state().prices.insert(ProductId::new(id), price.into());
    }

    /// Replace the server's copy of a collection.
    pub fn seed(&self, kind: CollectionKind, entries: &[(&str, u32)]) {
        let mut state = self.state();
        let seeded = entries
            .iter()
            .map(|(id, quantity)| wire(&state.prices, kind, ProductId::new(*id), *quantity))
            .collect();
        state.collections.insert(kind, seeded);
    }

    /// Fail the next matching request without touching server state.
    ///
    /// `request` is a [`RemoteRequest::name`], e.g. `"add"` or `"fetch"`.
    pub fn fail_next(&self, kind: CollectionKind, request: &'static str, error: TransportError) {
        self.state().failures.push_back(Scripted {
            kind,
            request,
            value: error,
        });
    }

    /// Hold the response of the next matching request until the gate opens.
    #[must_use]
    pub fn hold_next(&self, kind: CollectionKind, request: &'static str) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.state().holds.push_back(Scripted {
            kind,
            request,
            value: rx,
        });
        Gate(tx)
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<(CollectionKind, RemoteRequest)> {
        self.state().calls.clone()
    }

    /// Server-side `(id, quantity)` pairs of a collection.
    #[must_use]
    pub fn server_entries(&self, kind: CollectionKind) -> Vec<(String, u32)> {
        self.state()
            .collections
            .get(&kind)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| (e.id.to_string(), e.quantity.unwrap_or(1)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Wait until at least `count` requests have arrived.
    ///
    /// # Panics
    ///
    /// Panics if they do not arrive within five seconds.
    pub async fn wait_for_calls(&self, count: usize) {
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            while self.state().calls.len() < count {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "expected {count} request(s) to reach the stub");
    }

    fn take<V>(
        queue: &mut VecDeque<Scripted<V>>,
        kind: CollectionKind,
        request: &RemoteRequest,
    ) -> Option<V> {
        let position = queue.iter().position(|s| s.matches(kind, request))?;
        queue.remove(position).map(|s| s.value)
    }

    /// Apply a request to server state and return the resulting snapshot.
    fn serve(&self, kind: CollectionKind, request: &RemoteRequest) -> Vec<WireEntry> {
        let mut state = self.state();
        let StubState {
            collections,
            prices,
            ..
        } = &mut *state;
        let entries = collections.entry(kind).or_default();

        match request {
            RemoteRequest::Fetch => {}
            RemoteRequest::Add { id, quantity } => {
                match entries.iter_mut().find(|e| &e.id == id) {
                    Some(existing) if kind.tracks_quantity() => {
                        existing.quantity =
                            Some(existing.quantity.unwrap_or(1).saturating_add(*quantity));
                    }
                    Some(_) => {}
                    None => entries.push(wire(prices, kind, id.clone(), *quantity)),
                }
            }
            RemoteRequest::UpdateQuantity { id, quantity } => {
                if kind.tracks_quantity()
                    && let Some(existing) = entries.iter_mut().find(|e| &e.id == id)
                {
                    existing.quantity = Some(*quantity);
                }
            }
            RemoteRequest::Remove { id } => entries.retain(|e| &e.id != id),
        }
        entries.clone()
    }
}

fn wire(
    prices: &HashMap<ProductId, Decimal>,
    kind: CollectionKind,
    id: ProductId,
    quantity: u32,
) -> WireEntry {
    WireEntry {
        price: prices.get(&id).copied(),
        quantity: kind.tracks_quantity().then_some(quantity.max(1)),
        display: None,
        id,
    }
}

impl Transport for StubTransport {
    async fn execute(
        &self,
        kind: CollectionKind,
        request: &RemoteRequest,
        credential: &Credential,
    ) -> Result<Vec<WireEntry>, TransportError> {
        let (failure, hold) = {
            let mut state = self.state();
            state.calls.push((kind, request.clone()));
            if credential.expose_secret().is_empty() {
                return Err(TransportError::Unauthorized);
            }
            (
                Self::take(&mut state.failures, kind, request),
                Self::take(&mut state.holds, kind, request),
            )
        };

        let result = match failure {
            Some(error) => Err(error),
            None => Ok(self.serve(kind, request)),
        };

        if let Some(gate) = hold {
            let _ = gate.await;
        }
        result
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Engine configuration pointing nowhere, for stub-backed baskets.
#[must_use]
pub fn test_config(ordering: ReconcileOrdering) -> EngineConfig {
    #[allow(clippy::unwrap_used)]
    let mut config = EngineConfig::new(Url::parse("http://basket.test/api/").unwrap());
    config.reconcile_ordering = ordering;
    config
}

/// A basket over `transport`, signed in with [`TEST_TOKEN`].
#[must_use]
pub fn signed_in_basket(
    transport: StubTransport,
    ordering: ReconcileOrdering,
) -> Basket<StubTransport> {
    let basket = Basket::new(transport, &test_config(ordering));
    basket.login(Credential::new(TEST_TOKEN));
    basket
}

/// `(id, quantity)` pairs of a basket collection, in display order.
#[must_use]
pub fn local_entries(basket: &Basket<StubTransport>, kind: CollectionKind) -> Vec<(String, u32)> {
    basket
        .collection(kind)
        .current_entries()
        .iter()
        .map(|e| (e.id.to_string(), e.quantity))
        .collect()
}
