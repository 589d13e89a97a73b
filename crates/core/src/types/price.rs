//! Aggregate totals derived from a collection's entries.

use rust_decimal::Decimal;
use serde::Serialize;

use super::entry::Entry;

/// Totals derived from a collection.
///
/// Always recomputed from the full entry list, never patched incrementally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Totals {
    /// Sum of `price * quantity` over every entry with a known price.
    pub subtotal: Decimal,
    /// Same as `subtotal` but counting only server-reconciled entries.
    pub confirmed_subtotal: Decimal,
    /// Sum of quantities.
    pub item_count: u32,
    /// Number of entries still carrying provisional product data.
    pub provisional_lines: usize,
}

impl Totals {
    /// Recompute totals from a slice of entries.
    ///
    /// Sums saturate, so a hostile price can skew the figures but never panic.
    #[must_use]
    pub fn from_entries(entries: &[Entry]) -> Self {
        entries.iter().fold(Self::default(), |mut totals, entry| {
            let line = entry.line_total().unwrap_or_default();
            totals.subtotal = totals.subtotal.saturating_add(line);
            if entry.is_provisional() {
                totals.provisional_lines += 1;
            } else {
                totals.confirmed_subtotal = totals.confirmed_subtotal.saturating_add(line);
            }
            totals.item_count = totals.item_count.saturating_add(entry.quantity);
            totals
        })
    }

    /// True when every priced line has been confirmed by the server.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        self.provisional_lines == 0
    }
}
