//! Read-only depth queries over a book.

use crate::engine::book::Book;
use crate::engine::types::{InstrumentId, Side};
use either::Either;
use serde::{Deserialize, Serialize};

/// One price level as seen by a query: price, aggregate quantity, and the
/// number of queued orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelView {
    /// Level price in ticks.
    pub price: u64,
    /// Aggregate remaining quantity at the level.
    pub quantity: u64,
    /// Number of orders queued at the level.
    pub order_count: usize,
}

/// A point-in-time depth view of both sides, best price first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthView {
    /// The instrument the view was taken from.
    pub instrument: InstrumentId,
    /// Sequence of the last event applied before the view was taken.
    pub last_sequence: u64,
    /// Bid levels, highest price first.
    pub bids: Vec<LevelView>,
    /// Ask levels, lowest price first.
    pub asks: Vec<LevelView>,
}

impl Book {
    /// Iterates the levels of `side` best price first.
    ///
    /// Bids descend from the highest price, asks ascend from the lowest.
    /// The iterator borrows the book and allocates nothing.
    pub fn levels(&self, side: Side) -> impl Iterator<Item = LevelView> + '_ {
        let ordered = match side {
            Side::Bid => Either::Left(self.bids.iter().rev()),
            Side::Ask => Either::Right(self.asks.iter()),
        };
        ordered.map(|(price, level)| LevelView {
            price: *price,
            quantity: level.aggregate_quantity(),
            order_count: level.order_count(),
        })
    }

    /// Captures both sides truncated to `depth` levels each, best first.
    /// A depth of zero means no truncation.
    #[must_use]
    pub fn depth(&self, depth: usize) -> DepthView {
        let take = if depth == 0 { usize::MAX } else { depth };
        DepthView {
            instrument: self.instrument,
            last_sequence: self.last_sequence,
            bids: self.levels(Side::Bid).take(take).collect(),
            asks: self.levels(Side::Ask).take(take).collect(),
        }
    }
}
