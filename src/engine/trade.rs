//! Trade execution records and listener plumbing.

use crate::engine::types::{InstrumentId, OrderId, Side};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single execution produced by matching.
///
/// Trades are emitted as side effects of event application and never stored
/// in the book. The price is always the resting order's level price, so an
/// aggressor crossing several levels produces one record per resting fill,
/// each at that level's price. `sequence` and `timestamp_ns` are copied
/// from the event that triggered the execution, which keeps replayed event
/// streams byte-for-byte reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// The instrument the execution happened on.
    pub instrument: InstrumentId,
    /// Execution price in ticks (the resting order's level).
    pub price: u64,
    /// Executed quantity in lots.
    pub quantity: u64,
    /// The incoming order that triggered the match. `None` for
    /// venue-reported prints, where the aggressor is not ours.
    pub aggressor_order_id: Option<OrderId>,
    /// The resting order that was filled.
    pub resting_order_id: OrderId,
    /// Side of the aggressor. The resting order is on the opposite side.
    pub aggressor_side: Side,
    /// Sequence number of the event that produced this execution.
    pub sequence: u64,
    /// Venue timestamp of the triggering event, nanoseconds since epoch.
    pub timestamp_ns: u64,
}

impl Trade {
    /// Notional value of the execution (price × quantity), widened to
    /// avoid overflow on large books.
    #[must_use]
    #[inline]
    pub fn notional(&self) -> u128 {
        u128::from(self.price) * u128::from(self.quantity)
    }
}

/// Callback invoked for every emitted trade, after the book has settled.
///
/// Listeners run synchronously on the owning execution context and must be
/// fast and infallible; anything heavier belongs behind a channel.
pub type TradeListener = Arc<dyn Fn(&Trade) + Send + Sync>;
