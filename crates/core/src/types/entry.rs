//! Collection entries and the product data attached to them.
//!
//! An entry's product data is either *provisional* (whatever the caller had
//! in memory when the shopper acted) or *reconciled* (returned by the
//! collection server). Provisional prices are for immediate display only and
//! never count towards [`Totals::confirmed_subtotal`](crate::Totals).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::kind::CollectionKind;

/// Product data captured alongside an entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Unit price, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    /// Free-form display data (title, image URL, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<serde_json::Value>,
}

impl ProductSnapshot {
    /// A snapshot with no price or display data.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            price: None,
            display: None,
        }
    }

    /// A snapshot carrying only a unit price.
    #[must_use]
    pub const fn priced(price: Decimal) -> Self {
        Self {
            price: Some(price),
            display: None,
        }
    }

    /// Returns true if neither price nor display data is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.price.is_none() && self.display.is_none()
    }
}

/// Where an entry's product data came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// Supplied by the caller for an optimistic update; not trustworthy.
    Provisional(ProductSnapshot),
    /// Returned by the collection server.
    Reconciled(ProductSnapshot),
}

impl Snapshot {
    /// The product data regardless of provenance.
    #[must_use]
    pub const fn product(&self) -> &ProductSnapshot {
        match self {
            Self::Provisional(p) | Self::Reconciled(p) => p,
        }
    }

    #[must_use]
    pub const fn is_provisional(&self) -> bool {
        matches!(self, Self::Provisional(_))
    }
}

/// One line of a cart or one member of a wishlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Product this entry refers to. Unique within a collection.
    pub id: ProductId,
    /// Always at least 1. Wishlist entries always carry 1.
    pub quantity: u32,
    pub snapshot: Snapshot,
}

impl Entry {
    /// Create an entry from caller-supplied product data.
    #[must_use]
    pub fn provisional(id: ProductId, quantity: u32, product: ProductSnapshot) -> Self {
        Self {
            id,
            quantity: quantity.max(1),
            snapshot: Snapshot::Provisional(product),
        }
    }

    /// Create an entry from server-supplied product data.
    #[must_use]
    pub fn reconciled(id: ProductId, quantity: u32, product: ProductSnapshot) -> Self {
        Self {
            id,
            quantity: quantity.max(1),
            snapshot: Snapshot::Reconciled(product),
        }
    }

    /// Unit price times quantity, if the unit price is known.
    ///
    /// Saturates at the `Decimal` bounds instead of overflowing.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.snapshot
            .product()
            .price
            .map(|price| price.saturating_mul(Decimal::from(self.quantity)))
    }

    #[must_use]
    pub const fn is_provisional(&self) -> bool {
        self.snapshot.is_provisional()
    }
}

/// An entry as it travels over the wire.
///
/// ```json
/// { "id": "P1", "quantity": 2, "price": "50.00", "display": { "title": "Tee" } }
/// ```
///
/// `price` accepts either a string or a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEntry {
    pub id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<serde_json::Value>,
}

impl WireEntry {
    /// Convert into a reconciled entry for the given collection.
    ///
    /// Returns `None` for a cart line with an explicit quantity of zero.
    /// Wishlist entries always get quantity 1.
    #[must_use]
    pub fn into_entry(self, kind: CollectionKind) -> Option<Entry> {
        let quantity = if kind.tracks_quantity() {
            match self.quantity {
                Some(0) => return None,
                Some(q) => q,
                None => 1,
            }
        } else {
            1
        };

        Some(Entry::reconciled(
            self.id,
            quantity,
            ProductSnapshot {
                price: self.price,
                display: self.display,
            },
        ))
    }
}

impl From<&Entry> for WireEntry {
    fn from(entry: &Entry) -> Self {
        let product = entry.snapshot.product();
        Self {
            id: entry.id.clone(),
            quantity: Some(entry.quantity),
            price: product.price,
            display: product.display.clone(),
        }
    }
}
