//! Pineapple Basket Core - Shared cart and wishlist types.
//!
//! This crate provides the types shared by every Pineapple Basket component:
//! - `engine` - Optimistic mutation and reconciliation engine
//! - `cli` - Command-line driver for the engine
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no async runtime, no HTTP
//! clients. Anything that talks to the collection server lives in the engine.
//!
//! # Modules
//!
//! - [`types`] - Product IDs, entries, collections, totals and error kinds

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
