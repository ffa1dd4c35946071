//! Derived market metrics over a book.
//!
//! All of these are read-only single-pass calculations for strategy and
//! monitoring consumers. None of them lock or mutate.

use crate::engine::book::Book;
use crate::engine::types::Side;

impl Book {
    /// Mid price: the average of best bid and best ask. `None` unless both
    /// sides are populated.
    #[must_use]
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some((bid as f64 + ask as f64) / 2.0),
            _ => None,
        }
    }

    /// Spread in ticks (best ask minus best bid). `None` unless both sides
    /// are populated.
    #[must_use]
    pub fn spread(&self) -> Option<u64> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(ask.saturating_sub(bid)),
            _ => None,
        }
    }

    /// Volume-weighted average price over the top `depth` levels of
    /// `side`. A depth of zero means the whole side. `None` when the side
    /// is empty.
    #[must_use]
    pub fn vwap(&self, side: Side, depth: usize) -> Option<f64> {
        let take = if depth == 0 { usize::MAX } else { depth };
        let mut notional = 0u128;
        let mut volume = 0u128;
        for level in self.levels(side).take(take) {
            notional += u128::from(level.price) * u128::from(level.quantity);
            volume += u128::from(level.quantity);
        }
        if volume == 0 {
            return None;
        }
        Some(notional as f64 / volume as f64)
    }

    /// Order book imbalance over the top `depth` levels of each side:
    /// (bid volume - ask volume) / (bid volume + ask volume), in
    /// [-1.0, 1.0]. Positive values mean buy pressure. `None` when both
    /// sides are empty.
    #[must_use]
    pub fn imbalance(&self, depth: usize) -> Option<f64> {
        let take = if depth == 0 { usize::MAX } else { depth };
        let bid_volume: u128 = self
            .levels(Side::Bid)
            .take(take)
            .map(|level| u128::from(level.quantity))
            .sum();
        let ask_volume: u128 = self
            .levels(Side::Ask)
            .take(take)
            .map(|level| u128::from(level.quantity))
            .sum();
        let total = bid_volume + ask_volume;
        if total == 0 {
            return None;
        }
        Some((bid_volume as f64 - ask_volume as f64) / total as f64)
    }

    /// Total resting volume on `side`.
    #[must_use]
    pub fn side_volume(&self, side: Side) -> u64 {
        self.side(side)
            .values()
            .map(|level| level.aggregate_quantity())
            .sum()
    }
}
