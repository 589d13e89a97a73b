//! Integration tests for intents, reconciliation and hydration.
//!
//! The stub server answers immediately unless a request is held, so every
//! awaited mutation settles before the assertions that follow it.

use pineapple_basket_core::{CollectionKind, ErrorKind, ProductId, ProductSnapshot};
use pineapple_basket_engine::{
    Hydration, Outcome, ReconcileOrdering, RemoteRequest, TransportError,
};
use pineapple_basket_integration_tests::{
    StubTransport, local_entries, signed_in_basket,
};
use rust_decimal::Decimal;

const CART: CollectionKind = CollectionKind::Cart;
const WISHLIST: CollectionKind = CollectionKind::Wishlist;

fn pid(id: &str) -> ProductId {
    ProductId::new(id)
}

// =============================================================================
// Optimistic Add and Reconcile
// =============================================================================

#[tokio::test]
async fn test_add_shows_immediately_then_reconciles_to_server_snapshot() {
    let server = StubTransport::new();
    server.set_price("P1", 50);
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let cart = basket.cart();

    assert!(!cart.is_hydrated());
    let task = cart.add("P1", 1, None).unwrap();

    // Visible before the request settles
    let entries = cart.current_entries();
    assert_eq!(entries.len(), 1);
    let entry = entries.get(&pid("P1")).unwrap();
    assert_eq!(entry.quantity, 1);
    assert!(entry.is_provisional());
    assert!(cart.is_loading());

    assert_eq!(task.await, Outcome::Reconciled);

    let entries = cart.current_entries();
    let entry = entries.get(&pid("P1")).unwrap();
    assert!(!entry.is_provisional());
    assert_eq!(entry.snapshot.product().price, Some(Decimal::from(50)));
    assert_eq!(cart.totals().subtotal, Decimal::from(50));
    assert!(cart.totals().is_confirmed());
    assert!(cart.is_hydrated());
    assert!(!cart.is_loading());
    assert_eq!(cart.last_error(), None);
}

#[tokio::test]
async fn test_add_existing_line_increments() {
    let server = StubTransport::new();
    server.seed(CART, &[("P1", 2)]);
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let cart = basket.cart();
    assert_eq!(cart.hydrate().await, Hydration::Hydrated);

    let task = cart.add("P1", 3, None).unwrap();
    assert_eq!(local_entries(&basket, CART), [("P1".to_string(), 5)]);
    assert_eq!(task.await, Outcome::Reconciled);

    assert_eq!(local_entries(&basket, CART), [("P1".to_string(), 5)]);
    assert_eq!(server.server_entries(CART), [("P1".to_string(), 5)]);
}

#[tokio::test]
async fn test_provisional_price_comes_from_caller_snapshot() {
    let server = StubTransport::new();
    server.set_price("P1", 40);
    let basket = signed_in_basket(server, ReconcileOrdering::SettleOrder);
    let cart = basket.cart();

    let task = cart
        .add("P1", 2, Some(ProductSnapshot::priced(Decimal::from(45))))
        .unwrap();
    let totals = cart.totals();
    assert_eq!(totals.subtotal, Decimal::from(90));
    assert_eq!(totals.confirmed_subtotal, Decimal::ZERO);
    assert_eq!(totals.provisional_lines, 1);

    task.await;
    // The server's price replaces the caller's guess
    assert_eq!(cart.totals().subtotal, Decimal::from(80));
    assert_eq!(cart.totals().confirmed_subtotal, Decimal::from(80));
}

#[tokio::test]
async fn test_re_add_uses_last_known_server_price() {
    let server = StubTransport::new();
    server.set_price("P1", 30);
    server.seed(CART, &[("P1", 1)]);
    let basket = signed_in_basket(server, ReconcileOrdering::SettleOrder);
    let cart = basket.cart();
    cart.hydrate().await;

    cart.remove("P1").unwrap().await;
    assert!(cart.current_entries().is_empty());

    let task = cart.add("P1", 1, None).unwrap();
    let entries = cart.current_entries();
    let entry = entries.get(&pid("P1")).unwrap();
    assert!(entry.is_provisional());
    assert_eq!(entry.snapshot.product().price, Some(Decimal::from(30)));
    task.await;
}

// =============================================================================
// Set Quantity and Remove
// =============================================================================

#[tokio::test]
async fn test_set_quantity_zero_removes_and_sends_delete() {
    let server = StubTransport::new();
    server.seed(CART, &[("P1", 2)]);
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let cart = basket.cart();
    cart.hydrate().await;

    let task = cart.set_quantity("P1", 0).unwrap();
    assert!(cart.current_entries().is_empty());
    assert_eq!(task.await, Outcome::Reconciled);

    let (_, last) = server.calls().pop().unwrap();
    assert_eq!(last, RemoteRequest::Remove { id: pid("P1") });
    assert!(server.server_entries(CART).is_empty());
}

#[tokio::test]
async fn test_set_quantity_updates_line() {
    let server = StubTransport::new();
    server.seed(CART, &[("P1", 1), ("P2", 1)]);
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let cart = basket.cart();
    cart.hydrate().await;

    cart.set_quantity("P2", 4).unwrap().await;

    assert_eq!(
        local_entries(&basket, CART),
        [("P1".to_string(), 1), ("P2".to_string(), 4)]
    );
    assert_eq!(cart.totals().item_count, 5);
}

#[tokio::test]
async fn test_remove_absent_product_still_reconciles() {
    let server = StubTransport::new();
    server.seed(CART, &[("P1", 1)]);
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let cart = basket.cart();
    cart.hydrate().await;

    assert_eq!(cart.remove("P9").unwrap().await, Outcome::Reconciled);
    assert_eq!(local_entries(&basket, CART), [("P1".to_string(), 1)]);
    assert_eq!(cart.last_error(), None);
}

// =============================================================================
// Failure and Corrective Re-hydration
// =============================================================================

#[tokio::test]
async fn test_rejected_add_restores_server_state_and_surfaces_reason() {
    let server = StubTransport::new();
    server.seed(CART, &[("P1", 1)]);
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let cart = basket.cart();
    cart.hydrate().await;

    server.fail_next(CART, "add", TransportError::Rejected("Out of stock".to_string()));
    let task = cart.add("P2", 1, None).unwrap();
    assert_eq!(cart.current_entries().len(), 2);

    let outcome = task.await;
    let rejected = ErrorKind::ServerRejected {
        reason: "Out of stock".to_string(),
    };
    assert_eq!(
        outcome,
        Outcome::RolledBack {
            error: rejected.clone(),
            hydration: Hydration::Hydrated,
        }
    );
    assert_eq!(local_entries(&basket, CART), [("P1".to_string(), 1)]);
    assert_eq!(cart.last_error(), Some(rejected));
    assert!(cart.is_hydrated());
    assert!(!cart.is_loading());
}

#[tokio::test]
async fn test_network_failure_keeps_error_until_cleared() {
    let server = StubTransport::new();
    server.seed(CART, &[("P1", 2)]);
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let cart = basket.cart();
    cart.hydrate().await;

    server.fail_next(
        CART,
        "update_quantity",
        TransportError::Status {
            status: 503,
            body: "unavailable".to_string(),
        },
    );
    let outcome = cart.set_quantity("P1", 7).unwrap().await;
    assert!(matches!(
        outcome,
        Outcome::RolledBack {
            error: ErrorKind::NetworkFailure(_),
            ..
        }
    ));
    assert_eq!(local_entries(&basket, CART), [("P1".to_string(), 2)]);

    // A later success does not clear the error on its own
    cart.add("P2", 1, None).unwrap().await;
    assert!(matches!(cart.last_error(), Some(ErrorKind::NetworkFailure(_))));

    cart.clear_error();
    assert_eq!(cart.last_error(), None);
}

#[tokio::test]
async fn test_failure_before_hydration_still_fetches_ground_truth() {
    let server = StubTransport::new();
    server.seed(CART, &[("P1", 3)]);
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let cart = basket.cart();

    server.fail_next(CART, "remove", TransportError::Rejected("Locked".to_string()));
    let task = cart.remove("P1").unwrap();
    assert!(cart.current_entries().is_empty());

    task.await;
    assert_eq!(local_entries(&basket, CART), [("P1".to_string(), 3)]);
    assert!(cart.is_hydrated());
}

#[tokio::test]
async fn test_failed_rehydration_keeps_hydrated_flag() {
    let server = StubTransport::new();
    server.seed(CART, &[("P1", 1)]);
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let cart = basket.cart();
    cart.hydrate().await;

    server.fail_next(CART, "add", TransportError::Rejected("Nope".to_string()));
    server.fail_next(
        CART,
        "fetch",
        TransportError::Status {
            status: 502,
            body: String::new(),
        },
    );
    let outcome = cart.add("P2", 1, None).unwrap().await;

    assert!(matches!(
        outcome,
        Outcome::RolledBack {
            hydration: Hydration::Failed(ErrorKind::NetworkFailure(_)),
            ..
        }
    ));
    assert!(cart.is_hydrated());
    assert!(!cart.is_loading());
    // The optimistic entry stays until the next successful response
    assert_eq!(cart.current_entries().len(), 2);
}

// =============================================================================
// Hydration
// =============================================================================

#[tokio::test]
async fn test_hydrate_runs_once() {
    let server = StubTransport::new();
    server.seed(CART, &[("P1", 1)]);
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let cart = basket.cart();

    assert_eq!(cart.hydrate().await, Hydration::Hydrated);
    assert_eq!(cart.hydrate().await, Hydration::Skipped);
    assert_eq!(server.calls().len(), 1);
}

#[tokio::test]
async fn test_concurrent_hydrations_fetch_once() {
    let server = StubTransport::new();
    server.seed(CART, &[("P1", 1)]);
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let cart = basket.cart();

    let gate = server.hold_next(CART, "fetch");
    let first = tokio::spawn({
        let cart = cart.clone();
        async move { cart.hydrate().await }
    });
    server.wait_for_calls(1).await;

    assert!(cart.is_loading());
    assert_eq!(cart.hydrate().await, Hydration::Skipped);

    gate.release();
    assert_eq!(first.await.unwrap(), Hydration::Hydrated);
    assert_eq!(server.calls().len(), 1);
    assert!(!cart.is_loading());
}

#[tokio::test]
async fn test_hydrate_all_loads_both_collections() {
    let server = StubTransport::new();
    server.seed(CART, &[("P1", 2)]);
    server.seed(WISHLIST, &[("P7", 1), ("P8", 1)]);
    let basket = signed_in_basket(server, ReconcileOrdering::SettleOrder);

    let (cart, wishlist) = basket.hydrate_all().await;
    assert_eq!(cart, Hydration::Hydrated);
    assert_eq!(wishlist, Hydration::Hydrated);
    assert_eq!(basket.cart().totals().item_count, 2);
    assert_eq!(basket.wishlist().current_entries().len(), 2);
}

#[tokio::test]
async fn test_failed_hydration_leaves_store_unhydrated() {
    let server = StubTransport::new();
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let cart = basket.cart();

    server.fail_next(
        CART,
        "fetch",
        TransportError::Status {
            status: 500,
            body: String::new(),
        },
    );
    assert!(matches!(cart.hydrate().await, Hydration::Failed(_)));
    assert!(!cart.is_hydrated());
    assert!(cart.last_error().is_some());

    // Not hydrated, so the next attempt goes out
    assert_eq!(cart.hydrate().await, Hydration::Hydrated);
}

#[tokio::test]
async fn test_extreme_server_price_saturates_totals() {
    let server = StubTransport::new();
    server.set_price("P1", Decimal::MAX);
    server.seed(CART, &[("P1", 2)]);
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let cart = basket.cart();

    assert_eq!(cart.hydrate().await, Hydration::Hydrated);
    assert_eq!(cart.totals().subtotal, Decimal::MAX);
    assert!(!cart.is_loading());

    // Mutations keep reconciling against the same snapshot
    assert_eq!(cart.add("P2", 1, None).unwrap().await, Outcome::Reconciled);
    assert_eq!(cart.current_entries().len(), 2);
    assert_eq!(cart.totals().subtotal, Decimal::MAX);
    assert_eq!(cart.totals().item_count, 3);
    assert!(!cart.is_loading());
    assert_eq!(cart.last_error(), None);
}

// =============================================================================
// Wishlist
// =============================================================================

#[tokio::test]
async fn test_wishlist_membership_ignores_quantity() {
    let server = StubTransport::new();
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let wishlist = basket.wishlist();

    wishlist.add("P1", 5, None).unwrap().await;
    wishlist.add("P1", 2, None).unwrap().await;

    assert_eq!(local_entries(&basket, WISHLIST), [("P1".to_string(), 1)]);
    let sent: Vec<_> = server.calls().into_iter().map(|(_, request)| request).collect();
    assert_eq!(
        sent[0],
        RemoteRequest::Add {
            id: pid("P1"),
            quantity: 1
        }
    );

    wishlist.remove("P1").unwrap().await;
    assert!(wishlist.current_entries().is_empty());
    // The cart was never touched
    assert!(basket.cart().current_entries().is_empty());
    assert!(!basket.cart().is_hydrated());
}

// =============================================================================
// Observation
// =============================================================================

#[tokio::test]
async fn test_subscribers_see_each_transition() {
    let server = StubTransport::new();
    let basket = signed_in_basket(server, ReconcileOrdering::SettleOrder);
    let cart = basket.cart();
    let mut updates = cart.subscribe();
    updates.mark_unchanged();

    let task = cart.add("P1", 1, None).unwrap();
    assert!(updates.has_changed().unwrap());
    {
        let state = updates.borrow_and_update();
        assert!(state.is_loading());
        assert_eq!(state.entries().len(), 1);
    }

    task.await;
    assert!(updates.has_changed().unwrap());
    let state = updates.borrow_and_update();
    assert!(!state.is_loading());
    assert!(state.is_hydrated());
}

#[tokio::test]
async fn test_detached_task_still_settles() {
    let server = StubTransport::new();
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);
    let cart = basket.cart();
    let mut updates = cart.subscribe();

    cart.add("P1", 1, None).unwrap().detach();
    updates
        .wait_for(|state| !state.is_loading())
        .await
        .unwrap();

    assert!(cart.is_hydrated());
    assert_eq!(server.server_entries(CART), [("P1".to_string(), 1)]);
}
