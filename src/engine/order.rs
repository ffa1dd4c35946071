//! Resting order representation and lifecycle states.

use crate::engine::types::{OrderId, Side};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an order tracked by the book.
///
/// An order enters as `Resting`, moves to `PartiallyFilled` after its first
/// partial execution, and leaves the book as either `Filled` or `Cancelled`.
/// The terminal states are set on the order just before it is removed from
/// the arena so that downstream consumers observing removals see why the
/// order departed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// In the book at its full original quantity.
    Resting,
    /// In the book with some quantity already executed.
    PartiallyFilled,
    /// Fully executed and removed.
    Filled,
    /// Removed by an explicit cancel.
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Resting => write!(f, "Resting"),
            OrderStatus::PartiallyFilled => write!(f, "PartiallyFilled"),
            OrderStatus::Filled => write!(f, "Filled"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// A resting order in the book.
///
/// Orders live in a single arena keyed by [`OrderId`]; price levels hold
/// identifiers only, so an order is owned in exactly one place and belongs
/// to at most one level at a time. `quantity` is the remaining open
/// quantity, not the original size. `sequence` is the arrival sequence of
/// the event that put the order at its current queue position; a modify that
/// loses time priority re-stamps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Canonical order identifier.
    pub id: OrderId,
    /// Which side of the book the order rests on.
    pub side: Side,
    /// Limit price in ticks.
    pub price: u64,
    /// Remaining open quantity in lots.
    pub quantity: u64,
    /// Arrival sequence of the event that established the current queue
    /// position.
    pub sequence: u64,
    /// Identifier assigned by the venue.
    pub venue_order_id: u64,
    /// Current lifecycle state.
    pub status: OrderStatus,
}

impl Order {
    /// Reduce the remaining quantity by `fill`, updating lifecycle state.
    ///
    /// Saturates at zero; the caller removes the order from its level when
    /// the remaining quantity reaches zero.
    pub(crate) fn fill(&mut self, fill: u64) {
        self.quantity = self.quantity.saturating_sub(fill);
        self.status = if self.quantity == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }

    /// True once the order has no open quantity left.
    #[must_use]
    #[inline]
    pub fn is_filled(&self) -> bool {
        self.quantity == 0
    }
}
