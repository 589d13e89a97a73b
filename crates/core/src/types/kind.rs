//! The two personal collections a shopper can mutate.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a collection name cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown collection: {0} (expected `cart` or `wishlist`)")]
pub struct ParseCollectionKindError(String);

/// Which collection an entry, request or store belongs to.
///
/// Both collections share the same mutation protocol. They differ in whether
/// quantity is meaningful: cart lines carry a quantity, wishlist entries are
/// presence-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Cart,
    Wishlist,
}

impl CollectionKind {
    /// All collection kinds, in display order.
    pub const ALL: [Self; 2] = [Self::Cart, Self::Wishlist];

    /// URL path segment used by the collection server.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Wishlist => "wishlist",
        }
    }

    /// Whether entries in this collection carry a meaningful quantity.
    #[must_use]
    pub const fn tracks_quantity(self) -> bool {
        matches!(self, Self::Cart)
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

impl FromStr for CollectionKind {
    type Err = ParseCollectionKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cart" => Ok(Self::Cart),
            "wishlist" => Ok(Self::Wishlist),
            other => Err(ParseCollectionKindError(other.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Cart".parse::<CollectionKind>(), Ok(CollectionKind::Cart));
        assert_eq!(
            " WISHLIST ".parse::<CollectionKind>(),
            Ok(CollectionKind::Wishlist)
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "basket".parse::<CollectionKind>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown collection: basket (expected `cart` or `wishlist`)"
        );
    }

    #[test]
    fn test_only_cart_tracks_quantity() {
        assert!(CollectionKind::Cart.tracks_quantity());
        assert!(!CollectionKind::Wishlist.tracks_quantity());
    }
}
