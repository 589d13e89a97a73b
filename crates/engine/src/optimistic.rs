//! Optimistic Mutator: shopper intents applied locally before the network.
//!
//! Applying an intent is synchronous and never fails. It only decides what
//! the collection should look like right now and which single request must
//! be sent to make the server agree.

use pineapple_basket_core::{Collection, CollectionKind, Entry, ProductId, ProductSnapshot};

use crate::remote::RemoteRequest;

/// Something the shopper asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Add `quantity` of a product. Quantities below 1 count as 1.
    Add {
        id: ProductId,
        quantity: u32,
        snapshot: ProductSnapshot,
    },
    /// Remove a product. Removing an absent product is a no-op.
    Remove { id: ProductId },
    /// Set a cart line's quantity. Zero or less removes the line.
    SetQuantity { id: ProductId, quantity: i64 },
}

impl Intent {
    #[must_use]
    pub const fn product(&self) -> &ProductId {
        match self {
            Self::Add { id, .. } | Self::Remove { id } | Self::SetQuantity { id, .. } => id,
        }
    }

    /// Short name for logs and breadcrumbs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::SetQuantity { .. } => "set_quantity",
        }
    }

    /// Apply the intent to a collection. Returns whether anything changed.
    ///
    /// - `Add`: an existing cart line is incremented; an existing wishlist
    ///   entry is left alone; otherwise a provisional entry is inserted at the
    ///   head.
    /// - `Remove`: deletes the entry if present.
    /// - `SetQuantity`: `<= 0` behaves like `Remove`; otherwise overwrites an
    ///   existing cart line. Absent lines and wishlist entries are left alone.
    pub fn apply(&self, kind: CollectionKind, entries: &mut Collection) -> bool {
        match self {
            Self::Add {
                id,
                quantity,
                snapshot,
            } => {
                let quantity = add_quantity(kind, *quantity);
                if entries.contains(id) {
                    return kind.tracks_quantity() && entries.increment(id, quantity);
                }
                entries.insert_head(Entry::provisional(id.clone(), quantity, snapshot.clone()))
            }
            Self::Remove { id } => entries.remove(id).is_some(),
            Self::SetQuantity { id, quantity } => match positive_quantity(*quantity) {
                None => entries.remove(id).is_some(),
                Some(_) if !kind.tracks_quantity() => false,
                Some(quantity) => {
                    let current = entries.get(id).map(|e| e.quantity);
                    current.is_some_and(|q| q != quantity) && entries.set_quantity(id, quantity)
                }
            },
        }
    }

    /// The one request that makes the server agree with this intent.
    ///
    /// `SetQuantity` to zero or less is sent as a delete.
    #[must_use]
    pub fn remote_request(&self, kind: CollectionKind) -> RemoteRequest {
        match self {
            Self::Add { id, quantity, .. } => RemoteRequest::Add {
                id: id.clone(),
                quantity: add_quantity(kind, *quantity),
            },
            Self::Remove { id } => RemoteRequest::Remove { id: id.clone() },
            Self::SetQuantity { id, quantity } => match positive_quantity(*quantity) {
                Some(quantity) => RemoteRequest::UpdateQuantity {
                    id: id.clone(),
                    quantity,
                },
                None => RemoteRequest::Remove { id: id.clone() },
            },
        }
    }
}

/// Wishlist membership is boolean, so adds always carry 1.
fn add_quantity(kind: CollectionKind, requested: u32) -> u32 {
    if kind.tracks_quantity() {
        requested.max(1)
    } else {
        1
    }
}

fn positive_quantity(quantity: i64) -> Option<u32> {
    if quantity <= 0 {
        return None;
    }
    Some(u32::try_from(quantity).unwrap_or(u32::MAX))
}
