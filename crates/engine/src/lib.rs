//! Pineapple Basket Engine - optimistic cart and wishlist mutations.
//!
//! Shopper intents are applied to local state immediately, then sent to the
//! collection server. Every server reply carries the full collection, which
//! replaces local state wholesale. A failed request is surfaced as an error
//! and followed by a corrective re-hydration.
//!
//! # Modules
//!
//! - [`store`] - Per-collection observable state
//! - [`optimistic`] - Intents and their local effect
//! - [`remote`] - Transport trait and HTTP client
//! - [`reconcile`] - Settling responses into the store
//! - [`hydrate`] - Initial and corrective loads
//! - [`session`] - [`Basket`], the entry point tying them together
//! - [`cache`] - Last known product data for provisional entries
//!
//! # Example
//!
//! ```rust,ignore
//! let config = EngineConfig::from_env()?;
//! let basket = Basket::new(HttpTransport::new(&config)?, &config);
//! basket.hydrate_all().await;
//! let outcome = basket.cart().add("P1", 1, None)?.await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod error;
pub mod hydrate;
pub mod optimistic;
pub mod reconcile;
pub mod remote;
pub mod session;
pub mod store;

pub use config::{ConfigError, EngineConfig, SnapshotCacheConfig};
pub use error::TransportError;
pub use hydrate::Hydration;
pub use optimistic::Intent;
pub use reconcile::{Outcome, ReconcileOrdering};
pub use remote::{Credential, HttpTransport, RemoteRequest, Transport};
pub use session::{Basket, CollectionHandle, MutationTask};
pub use store::{CollectionStore, StoreState};
