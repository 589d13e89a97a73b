//! Collection Store: the single owner of one collection's state.
//!
//! All state lives in a `tokio::sync::watch` channel. Every transition is a
//! single `send_modify`/`send_if_modified` closure, so the entry list, the
//! derived totals and the lifecycle flags always change together and a UI
//! holding a receiver never observes totals that disagree with the entries.
//!
//! Transitions are crate-private: callers express intents through
//! [`crate::session::CollectionHandle`], never by writing to the store.

use std::collections::HashMap;

use pineapple_basket_core::{Collection, CollectionKind, ErrorKind, ProductId, Totals};
use tokio::sync::watch;

use crate::reconcile::ReconcileOrdering;

/// Observable state of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreState {
    entries: Collection,
    totals: Totals,
    hydrated: bool,
    in_flight: usize,
    hydrating: bool,
    last_error: Option<ErrorKind>,
    /// Bumped on reset; requests issued under an older epoch are ignored.
    epoch: u64,
    next_sequence: u64,
    /// Highest request sequence reconciled per product.
    reconciled: HashMap<ProductId, u64>,
}

impl StoreState {
    #[must_use]
    pub const fn entries(&self) -> &Collection {
        &self.entries
    }

    #[must_use]
    pub const fn totals(&self) -> &Totals {
        &self.totals
    }

    /// True once a hydration or mutation response has been applied.
    #[must_use]
    pub const fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// True while any mutation or hydration request is outstanding.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    /// True while a hydration request is outstanding.
    #[must_use]
    pub const fn is_hydrating(&self) -> bool {
        self.hydrating
    }

    #[must_use]
    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    #[must_use]
    pub const fn last_error(&self) -> Option<&ErrorKind> {
        self.last_error.as_ref()
    }

    fn set_entries(&mut self, entries: Collection) {
        self.totals = entries.totals();
        self.entries = entries;
    }

    fn issue_ticket(&mut self, product: Option<&ProductId>) -> RequestTicket {
        self.in_flight += 1;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        RequestTicket {
            epoch: self.epoch,
            sequence,
            product: product.cloned(),
        }
    }
}

/// Identifies one outstanding request against a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    epoch: u64,
    sequence: u64,
    product: Option<ProductId>,
}

impl RequestTicket {
    /// Monotonic issue order within the store.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Product the request mutates, `None` for hydration.
    #[must_use]
    pub const fn product(&self) -> Option<&ProductId> {
        self.product.as_ref()
    }
}

/// What a store did with a settled response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The response was applied.
    Applied,
    /// A response to a newer request was already reconciled.
    Stale,
    /// The store was reset after the request was issued.
    Discarded,
}

/// State container for one collection of the signed-in shopper.
#[derive(Debug)]
pub struct CollectionStore {
    kind: CollectionKind,
    state: watch::Sender<StoreState>,
}

impl CollectionStore {
    /// Create an empty, unhydrated store.
    #[must_use]
    pub fn new(kind: CollectionKind) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self { kind, state }
    }

    #[must_use]
    pub const fn kind(&self) -> CollectionKind {
        self.kind
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current entries, most recently added first.
    #[must_use]
    pub fn current_entries(&self) -> Collection {
        self.state.borrow().entries.clone()
    }

    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.state.borrow().hydrated
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.state.borrow().last_error.clone()
    }

    #[must_use]
    pub fn totals(&self) -> Totals {
        self.state.borrow().totals
    }

    /// Clone of the full state.
    #[must_use]
    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    /// Receive every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Identity epoch the store is currently in.
    pub(crate) fn epoch(&self) -> u64 {
        self.state.borrow().epoch
    }

    /// Apply a local mutation and register its outstanding request.
    ///
    /// Both happen in one transition, and only while the store is still in
    /// `epoch`. Returns `None` without touching anything after a reset, so a
    /// signed-out identity's change never lands in the next one's store.
    /// Otherwise returns the ticket and whether the entries changed.
    pub(crate) fn begin_request(
        &self,
        epoch: u64,
        product: &ProductId,
        mutate: impl FnOnce(&mut Collection) -> bool,
    ) -> Option<(RequestTicket, bool)> {
        let mut begun = None;
        self.state.send_if_modified(|state| {
            if state.epoch != epoch {
                return false;
            }
            let changed = mutate(&mut state.entries);
            if changed {
                state.totals = state.entries.totals();
            }
            begun = Some((state.issue_ticket(Some(product)), changed));
            true
        });
        begun
    }

    /// Register an outstanding hydration, unless one is already in flight.
    ///
    /// Without `force`, an already-hydrated store is also left alone.
    pub(crate) fn begin_hydration(&self, force: bool) -> Option<RequestTicket> {
        let mut ticket = None;
        self.state.send_if_modified(|state| {
            if state.hydrating || (state.hydrated && !force) {
                return false;
            }
            state.hydrating = true;
            ticket = Some(state.issue_ticket(None));
            true
        });
        ticket
    }

    /// Replace entries wholesale with an authoritative snapshot.
    pub(crate) fn replace_entries(
        &self,
        ticket: &RequestTicket,
        snapshot: Collection,
        ordering: ReconcileOrdering,
    ) -> Settlement {
        let mut settlement = Settlement::Discarded;
        self.state.send_if_modified(|state| {
            if state.epoch != ticket.epoch {
                return false;
            }
            state.in_flight = state.in_flight.saturating_sub(1);

            if let Some(product) = &ticket.product {
                let newer_seen = state
                    .reconciled
                    .get(product)
                    .is_some_and(|&seen| seen > ticket.sequence);
                if newer_seen && ordering == ReconcileOrdering::IssueOrder {
                    settlement = Settlement::Stale;
                    return true;
                }
                let seen = state.reconciled.entry(product.clone()).or_insert(0);
                *seen = (*seen).max(ticket.sequence);
            }

            state.set_entries(snapshot);
            state.hydrated = true;
            settlement = Settlement::Applied;
            true
        });
        settlement
    }

    /// Settle a failed mutation request and record its error.
    pub(crate) fn fail_request(&self, ticket: &RequestTicket, error: ErrorKind) -> Settlement {
        let mut settlement = Settlement::Discarded;
        self.state.send_if_modified(|state| {
            if state.epoch != ticket.epoch {
                return false;
            }
            state.in_flight = state.in_flight.saturating_sub(1);
            state.last_error = Some(error);
            settlement = Settlement::Applied;
            true
        });
        settlement
    }

    /// Feed a hydration snapshot into the store.
    ///
    /// Under [`ReconcileOrdering::IssueOrder`] the snapshot is dropped as
    /// stale once any mutation issued after the fetch has been reconciled.
    pub(crate) fn hydrate_collection(
        &self,
        ticket: &RequestTicket,
        snapshot: Collection,
        ordering: ReconcileOrdering,
    ) -> Settlement {
        let mut settlement = Settlement::Discarded;
        self.state.send_if_modified(|state| {
            if state.epoch != ticket.epoch {
                return false;
            }
            state.in_flight = state.in_flight.saturating_sub(1);
            state.hydrating = false;

            let overtaken = state.reconciled.values().any(|&seen| seen > ticket.sequence);
            if overtaken && ordering == ReconcileOrdering::IssueOrder {
                settlement = Settlement::Stale;
                return true;
            }

            state.set_entries(snapshot);
            state.hydrated = true;
            settlement = Settlement::Applied;
            true
        });
        settlement
    }

    /// Settle a failed hydration. `hydrated` is left as it was.
    pub(crate) fn fail_hydration(&self, ticket: &RequestTicket, error: ErrorKind) -> Settlement {
        let mut settlement = Settlement::Discarded;
        self.state.send_if_modified(|state| {
            if state.epoch != ticket.epoch {
                return false;
            }
            state.in_flight = state.in_flight.saturating_sub(1);
            state.hydrating = false;
            state.last_error = Some(error);
            settlement = Settlement::Applied;
            true
        });
        settlement
    }

    /// Record an error that did not involve an outstanding request.
    pub(crate) fn record_error(&self, error: ErrorKind) {
        self.state.send_modify(|state| state.last_error = Some(error));
    }

    /// Dismiss the last error (the UI has shown its notification).
    pub fn clear_error(&self) {
        self.state.send_if_modified(|state| state.last_error.take().is_some());
    }

    /// Return to the empty, unhydrated initial state.
    ///
    /// Responses to requests issued before the reset are discarded.
    pub(crate) fn reset_collection(&self) {
        self.state.send_modify(|state| {
            *state = StoreState {
                epoch: state.epoch.wrapping_add(1),
                next_sequence: state.next_sequence,
                ..StoreState::default()
            };
        });
    }
}
