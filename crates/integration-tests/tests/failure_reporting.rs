//! Integration tests for which failures reach Sentry.
//!
//! Each test binds a client with an in-memory transport to its own thread's
//! hub. The runtime is current-thread, so spawned mutations report there too.

use std::sync::{Arc, Mutex};

use pineapple_basket_core::CollectionKind;
use pineapple_basket_engine::{Outcome, ReconcileOrdering, TransportError};
use pineapple_basket_integration_tests::{StubTransport, signed_in_basket};
use sentry::protocol::Event;

const CART: CollectionKind = CollectionKind::Cart;

#[derive(Default)]
struct CapturedEvents(Mutex<Vec<Event<'static>>>);

impl CapturedEvents {
    fn tags(&self) -> Vec<(String, String)> {
        let events = self.0.lock().unwrap();
        events
            .iter()
            .map(|event| {
                (
                    event.tags.get("collection").cloned().unwrap_or_default(),
                    event.tags.get("operation").cloned().unwrap_or_default(),
                )
            })
            .collect()
    }
}

impl sentry::Transport for CapturedEvents {
    fn send_envelope(&self, envelope: sentry::Envelope) {
        if let Some(event) = envelope.event() {
            self.0.lock().unwrap().push(event.clone());
        }
    }
}

fn capture_events() -> (Arc<CapturedEvents>, sentry::ClientInitGuard) {
    let events = Arc::new(CapturedEvents::default());
    let guard = sentry::init(sentry::ClientOptions {
        dsn: Some("https://public@sentry.invalid/1".parse().unwrap()),
        transport: Some(Arc::new(Arc::clone(&events))),
        ..Default::default()
    });
    (events, guard)
}

#[tokio::test]
async fn test_failure_while_signed_in_is_reported() {
    let (events, _guard) = capture_events();
    let server = StubTransport::new();
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);

    server.fail_next(
        CART,
        "add",
        TransportError::Status {
            status: 503,
            body: String::new(),
        },
    );
    let outcome = basket.cart().add("P1", 1, None).unwrap().await;

    assert!(matches!(outcome, Outcome::RolledBack { .. }));
    assert_eq!(events.tags(), vec![("cart".to_string(), "add".to_string())]);
}

#[tokio::test]
async fn test_failure_after_logout_is_not_reported() {
    let (events, _guard) = capture_events();
    let server = StubTransport::new();
    let basket = signed_in_basket(server.clone(), ReconcileOrdering::SettleOrder);

    server.fail_next(
        CART,
        "add",
        TransportError::Status {
            status: 503,
            body: String::new(),
        },
    );
    let gate = server.hold_next(CART, "add");
    let task = basket.cart().add("P1", 1, None).unwrap();
    server.wait_for_calls(1).await;

    basket.logout();
    gate.release();

    assert_eq!(task.await, Outcome::Discarded);
    assert!(events.tags().is_empty());
}
