//! Core types for Pineapple Basket.
//!
//! This module provides type-safe wrappers for cart and wishlist concepts.

pub mod collection;
pub mod entry;
pub mod error;
pub mod id;
pub mod kind;
pub mod price;

pub use collection::Collection;
pub use entry::{Entry, ProductSnapshot, Snapshot, WireEntry};
pub use error::ErrorKind;
pub use id::*;
pub use kind::{CollectionKind, ParseCollectionKindError};
pub use price::Totals;
