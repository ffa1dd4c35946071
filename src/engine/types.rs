//! Core identifier, side, and canonical event types.
//!
//! Every component in the engine speaks the same canonical event language:
//! upstream gateways normalize venue messages into [`OrderEvent`] values, the
//! ingestor validates their sequence numbers, and the book applies them with
//! a single exhaustive match over [`EventKind`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a tracked instrument.
///
/// Venue symbols are resolved to compact numeric identifiers at the gateway
/// boundary; everything downstream routes and logs by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstrumentId(pub u32);

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for an order, unique within an instrument's event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The side of the book an order rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy interest; levels are ranked highest price first.
    Bid,
    /// Sell interest; levels are ranked lowest price first.
    Ask,
}

impl Side {
    /// Returns the opposite side of the book.
    #[must_use]
    #[inline]
    pub fn opposite(&self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "BID"),
            Side::Ask => write!(f, "ASK"),
        }
    }
}

/// How long an incoming order remains eligible for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Rest any unfilled remainder in the book until cancelled.
    Gtc,
    /// Match whatever crosses immediately, then discard the remainder.
    Ioc,
    /// Execute the full quantity immediately or not at all. The opposing
    /// side is checked for sufficient crossing liquidity before any fill
    /// happens, so a failed fill-or-kill leaves the book untouched.
    Fok,
    /// No limit price. The order is priced at the worst opposing level
    /// currently in the book and then treated as immediate-or-cancel. The
    /// `price` field of the Add event is ignored and conventionally zero.
    Market,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Gtc => write!(f, "GTC"),
            TimeInForce::Ioc => write!(f, "IOC"),
            TimeInForce::Fok => write!(f, "FOK"),
            TimeInForce::Market => write!(f, "MARKET"),
        }
    }
}

/// A canonical order event, normalized from a raw venue message.
///
/// The envelope carries the routing and ordering fields shared by every
/// event; the payload in [`kind`](Self::kind) carries the operation. The
/// `sequence` is the sole ordering authority for an instrument: the
/// ingestor admits events strictly in sequence order and the book refuses
/// anything at or below its last applied sequence. `timestamp_ns` is the
/// venue wall-clock time and is carried through to trade records but never
/// consulted for ordering decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// The instrument this event belongs to.
    pub instrument: InstrumentId,

    /// Per-instrument sequence number assigned by the venue feed.
    pub sequence: u64,

    /// Venue wall-clock timestamp in nanoseconds since the Unix epoch.
    pub timestamp_ns: u64,

    /// The operation to apply.
    pub kind: EventKind,
}

/// The operation carried by an [`OrderEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A new order entering the book.
    Add {
        /// Canonical order identifier assigned at normalization.
        order_id: OrderId,
        /// The identifier the venue itself assigned to this order.
        venue_order_id: u64,
        /// Which side of the book the order is for.
        side: Side,
        /// Limit price in ticks. Zero for market orders, positive otherwise.
        price: u64,
        /// Order quantity in lots. Must be positive.
        quantity: u64,
        /// Execution constraint for the order.
        time_in_force: TimeInForce,
    },

    /// A price and/or quantity change to a resting order.
    Modify {
        /// The order being modified.
        order_id: OrderId,
        /// Replacement limit price in ticks. Must be positive.
        new_price: u64,
        /// Replacement quantity in lots. Must be positive; a cancel is the
        /// explicit path for removing an order.
        new_quantity: u64,
    },

    /// Removal of a resting order.
    Cancel {
        /// The order being cancelled.
        order_id: OrderId,
    },

    /// A venue-reported execution against one of our resting orders. The
    /// aggressor is not ours, so only the resting side is identified.
    Trade {
        /// The resting order that was executed against.
        order_id: OrderId,
        /// Executed quantity in lots.
        quantity: u64,
    },
}

impl OrderEvent {
    /// Returns the order identifier referenced by this event.
    #[must_use]
    pub fn order_id(&self) -> OrderId {
        match self.kind {
            EventKind::Add { order_id, .. }
            | EventKind::Modify { order_id, .. }
            | EventKind::Cancel { order_id }
            | EventKind::Trade { order_id, .. } => order_id,
        }
    }

    /// Short label for the event kind, used in logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self.kind {
            EventKind::Add { .. } => "Add",
            EventKind::Modify { .. } => "Modify",
            EventKind::Cancel { .. } => "Cancel",
            EventKind::Trade { .. } => "Trade",
        }
    }
}
