//! Per-instrument limit order book state machine.
//!
//! A [`Book`] is owned and mutated by exactly one execution context. Events
//! arrive strictly in sequence order and are applied synchronously; there is
//! no locking anywhere in the apply or matching path. Orders live in a
//! single arena keyed by [`OrderId`]; price levels hold identifiers only, so
//! every order belongs to at most one level and all lookups go through the
//! arena.

use crate::engine::error::BookError;
use crate::engine::level::PriceLevel;
use crate::engine::order::{Order, OrderStatus};
use crate::engine::trade::{Trade, TradeListener};
use crate::engine::types::{EventKind, InstrumentId, OrderEvent, OrderId, Side, TimeInForce};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{error, trace};

/// A change to a single price level, produced while applying one event.
///
/// The publisher turns these into deltas. `aggregate_quantity` is the
/// level's state after the change; `level_removed` marks the level's last
/// order departing, in which case the aggregate is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    /// Side of the changed level.
    pub side: Side,
    /// Price of the changed level in ticks.
    pub price: u64,
    /// Aggregate remaining quantity at the level after the change.
    pub aggregate_quantity: u64,
    /// True when the change removed the level entirely.
    pub level_removed: bool,
}

/// Everything one applied event did to the book.
///
/// `changes` is coalesced per (side, price): a level touched several times
/// within one event appears once, carrying its final aggregate. `removed`
/// holds orders that left the book or were discarded without resting,
/// with their terminal [`OrderStatus`] set.
#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
    /// Executions emitted while applying the event.
    pub trades: Vec<Trade>,
    /// Price level changes, in first-touch order.
    pub changes: Vec<LevelChange>,
    /// Orders that departed, with terminal lifecycle state.
    pub removed: Vec<Order>,
}

impl ApplyOutcome {
    /// True when the event changed nothing observable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty() && self.changes.is_empty() && self.removed.is_empty()
    }

    pub(crate) fn record_change(
        &mut self,
        side: Side,
        price: u64,
        aggregate_quantity: u64,
        level_removed: bool,
    ) {
        if let Some(existing) = self
            .changes
            .iter_mut()
            .find(|c| c.side == side && c.price == price)
        {
            existing.aggregate_quantity = aggregate_quantity;
            existing.level_removed = level_removed;
            return;
        }
        self.changes.push(LevelChange {
            side,
            price,
            aggregate_quantity,
            level_removed,
        });
    }
}

/// In-memory price-time-ordered book for one instrument.
pub struct Book {
    pub(super) instrument: InstrumentId,
    /// Bid levels keyed by price; iterated in reverse for best-first order.
    pub(super) bids: BTreeMap<u64, PriceLevel>,
    /// Ask levels keyed by price; natural order is best-first.
    pub(super) asks: BTreeMap<u64, PriceLevel>,
    /// Arena owning every resting order.
    pub(super) orders: HashMap<OrderId, Order>,
    pub(super) last_sequence: u64,
    pub(super) stale: bool,
    pub(super) trade_listener: Option<TradeListener>,
}

impl Book {
    /// Creates an empty book for `instrument`.
    #[must_use]
    pub fn new(instrument: InstrumentId) -> Self {
        Self {
            instrument,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            orders: HashMap::new(),
            last_sequence: 0,
            stale: false,
            trade_listener: None,
        }
    }

    /// Creates an empty book with a trade listener attached.
    ///
    /// The listener runs synchronously on the owning execution context for
    /// every emitted trade, after the event's mutations have settled.
    #[must_use]
    pub fn with_trade_listener(instrument: InstrumentId, listener: TradeListener) -> Self {
        let mut book = Self::new(instrument);
        book.trade_listener = Some(listener);
        book
    }

    /// The instrument this book tracks.
    #[must_use]
    #[inline]
    pub fn instrument(&self) -> InstrumentId {
        self.instrument
    }

    /// Sequence number of the last event this book consumed.
    #[must_use]
    #[inline]
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// True once a sequence gap has invalidated this book. A stale book
    /// refuses every event until a snapshot restore clears the flag.
    #[must_use]
    #[inline]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Marks the book stale after an upstream sequence gap.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Number of resting orders across both sides.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Number of price levels on `side`.
    #[must_use]
    pub fn level_count(&self, side: Side) -> usize {
        match side {
            Side::Bid => self.bids.len(),
            Side::Ask => self.asks.len(),
        }
    }

    /// Looks up a resting order by identifier.
    #[must_use]
    pub fn get_order(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    /// Best bid as (price, aggregate quantity).
    #[must_use]
    pub fn best_bid(&self) -> Option<(u64, u64)> {
        self.bids
            .last_key_value()
            .map(|(price, level)| (*price, level.aggregate_quantity()))
    }

    /// Best ask as (price, aggregate quantity).
    #[must_use]
    pub fn best_ask(&self) -> Option<(u64, u64)> {
        self.asks
            .first_key_value()
            .map(|(price, level)| (*price, level.aggregate_quantity()))
    }

    pub(super) fn side(&self, side: Side) -> &BTreeMap<u64, PriceLevel> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    pub(super) fn side_mut(&mut self, side: Side) -> &mut BTreeMap<u64, PriceLevel> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Applies one canonical event to the book.
    ///
    /// This is the single entry point for every mutation. The event must
    /// carry this book's instrument and a sequence number strictly above
    /// the last applied one; the ingestor upstream guarantees the stronger
    /// exactly-next property.
    ///
    /// # Errors
    ///
    /// - [`BookError::Stale`] while the book awaits a snapshot.
    /// - [`BookError::Validation`] for malformed events; nothing is mutated
    ///   and the sequence does not advance.
    /// - [`BookError::UnknownOrder`] for Cancel/Modify/Trade against an
    ///   absent identifier. The event is consumed (the sequence advances)
    ///   but no state changes; callers log and continue.
    pub fn apply(&mut self, event: OrderEvent) -> Result<ApplyOutcome, BookError> {
        if self.stale {
            return Err(BookError::Stale {
                instrument: self.instrument,
            });
        }
        if event.instrument != self.instrument {
            return Err(BookError::validation(format!(
                "event for instrument {} routed to book for instrument {}",
                event.instrument, self.instrument
            )));
        }
        if event.sequence <= self.last_sequence {
            return Err(BookError::validation(format!(
                "sequence {} not above last applied {}",
                event.sequence, self.last_sequence
            )));
        }

        trace!(
            "book {}: applying {} seq={} order={}",
            self.instrument,
            event.label(),
            event.sequence,
            event.order_id()
        );

        let mut outcome = ApplyOutcome::default();
        let result = match event.kind {
            EventKind::Add {
                order_id,
                venue_order_id,
                side,
                price,
                quantity,
                time_in_force,
            } => self.apply_add(
                &event,
                order_id,
                venue_order_id,
                side,
                price,
                quantity,
                time_in_force,
                &mut outcome,
            ),
            EventKind::Modify {
                order_id,
                new_price,
                new_quantity,
            } => self.apply_modify(&event, order_id, new_price, new_quantity, &mut outcome),
            EventKind::Cancel { order_id } => self.apply_cancel(order_id, &mut outcome),
            EventKind::Trade { order_id, quantity } => {
                self.apply_venue_trade(&event, order_id, quantity, &mut outcome)
            }
        };

        match result {
            Ok(()) => {
                self.last_sequence = event.sequence;
                self.notify_trades(&outcome);
                Ok(outcome)
            }
            Err(err @ BookError::UnknownOrder { .. }) => {
                // The event slot is consumed even though nothing changed;
                // snapshots taken afterwards must stay aligned with the feed.
                self.last_sequence = event.sequence;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_add(
        &mut self,
        event: &OrderEvent,
        order_id: OrderId,
        venue_order_id: u64,
        side: Side,
        price: u64,
        quantity: u64,
        time_in_force: TimeInForce,
        outcome: &mut ApplyOutcome,
    ) -> Result<(), BookError> {
        if quantity == 0 {
            return Err(BookError::validation("add with zero quantity"));
        }
        if self.orders.contains_key(&order_id) {
            return Err(BookError::validation(format!(
                "duplicate order id {order_id}"
            )));
        }
        let price = match time_in_force {
            TimeInForce::Market => self.resolve_market_price(side)?,
            _ if price == 0 => {
                return Err(BookError::validation("add with zero price"));
            }
            _ => price,
        };

        let mut incoming = Order {
            id: order_id,
            side,
            price,
            quantity,
            sequence: event.sequence,
            venue_order_id,
            status: OrderStatus::Resting,
        };

        if time_in_force == TimeInForce::Fok
            && !self.can_fill_completely(side, price, quantity)
        {
            trace!(
                "book {}: fill-or-kill order {} for {} @ {} discarded, insufficient crossing liquidity",
                self.instrument, order_id, quantity, price
            );
            incoming.status = OrderStatus::Cancelled;
            outcome.removed.push(incoming);
            return Ok(());
        }

        self.execute_crossing(event, &mut incoming, outcome);

        if incoming.quantity > 0 && time_in_force == TimeInForce::Gtc {
            self.rest_order(incoming, outcome);
        } else {
            // Ioc and market remainders are discarded; a fill-or-kill that
            // passed the pre-check always reaches zero in the cross.
            if incoming.quantity > 0 {
                incoming.status = OrderStatus::Cancelled;
            }
            outcome.removed.push(incoming);
        }
        Ok(())
    }

    fn apply_cancel(&mut self, order_id: OrderId, outcome: &mut ApplyOutcome) -> Result<(), BookError> {
        let Some(mut order) = self.orders.remove(&order_id) else {
            return Err(BookError::UnknownOrder { order_id });
        };
        self.remove_resting(&order, outcome);
        order.status = OrderStatus::Cancelled;
        trace!(
            "book {}: cancelled order {order_id}, {} remaining released at {} {}",
            self.instrument, order.quantity, order.side, order.price
        );
        outcome.removed.push(order);
        Ok(())
    }

    fn apply_modify(
        &mut self,
        event: &OrderEvent,
        order_id: OrderId,
        new_price: u64,
        new_quantity: u64,
        outcome: &mut ApplyOutcome,
    ) -> Result<(), BookError> {
        if new_price == 0 {
            return Err(BookError::validation("modify with zero price"));
        }
        if new_quantity == 0 {
            return Err(BookError::validation(
                "modify with zero quantity; cancel is the removal path",
            ));
        }
        let Some(mut order) = self.orders.remove(&order_id) else {
            return Err(BookError::UnknownOrder { order_id });
        };

        if new_price == order.price && new_quantity <= order.quantity {
            // Quantity reduction at the same price keeps queue position.
            let delta = order.quantity - new_quantity;
            order.quantity = new_quantity;
            if delta > 0 {
                let mut aggregate = 0;
                let mut found = false;
                if let Some(level) = self.side_mut(order.side).get_mut(&order.price) {
                    level.reduce(delta);
                    aggregate = level.aggregate_quantity();
                    found = true;
                }
                if found {
                    outcome.record_change(order.side, order.price, aggregate, false);
                } else {
                    error!(
                        "book {}: order {order_id} tracked but level {} {} missing",
                        self.instrument, order.side, order.price
                    );
                }
                trace!(
                    "book {}: reduced order {order_id} in place to {new_quantity}",
                    self.instrument
                );
            }
            self.orders.insert(order_id, order);
            return Ok(());
        }

        // Price change or quantity increase: the order loses time priority
        // and re-enters as a fresh arrival, crossing check included.
        self.remove_resting(&order, outcome);
        order.price = new_price;
        order.quantity = new_quantity;
        order.sequence = event.sequence;
        order.status = OrderStatus::Resting;
        trace!(
            "book {}: modify re-queues order {order_id} at {} {} x {}",
            self.instrument, order.side, new_price, new_quantity
        );

        self.execute_crossing(event, &mut order, outcome);
        if order.quantity > 0 {
            self.rest_order(order, outcome);
        } else {
            outcome.removed.push(order);
        }
        Ok(())
    }

    fn apply_venue_trade(
        &mut self,
        event: &OrderEvent,
        order_id: OrderId,
        quantity: u64,
        outcome: &mut ApplyOutcome,
    ) -> Result<(), BookError> {
        if quantity == 0 {
            return Err(BookError::validation("trade with zero quantity"));
        }
        let Some(order) = self.orders.get(&order_id).copied() else {
            return Err(BookError::UnknownOrder { order_id });
        };
        let fill = quantity.min(order.quantity);
        if fill < quantity {
            error!(
                "book {}: venue print of {quantity} exceeds remaining {} on order {order_id}",
                self.instrument, order.quantity
            );
        }
        outcome.trades.push(Trade {
            instrument: self.instrument,
            price: order.price,
            quantity: fill,
            aggressor_order_id: None,
            resting_order_id: order_id,
            aggressor_side: order.side.opposite(),
            sequence: event.sequence,
            timestamp_ns: event.timestamp_ns,
        });
        self.fill_resting(order_id, fill, outcome);
        Ok(())
    }

    /// Inserts an order at the tail of its level, creating the level if
    /// absent, and records the level change.
    pub(super) fn rest_order(&mut self, order: Order, outcome: &mut ApplyOutcome) {
        let level = self
            .side_mut(order.side)
            .entry(order.price)
            .or_insert_with(|| PriceLevel::new(order.price));
        level.push_back(order.id, order.quantity);
        let aggregate = level.aggregate_quantity();
        outcome.record_change(order.side, order.price, aggregate, false);
        trace!(
            "book {}: rested order {} at {} {} x {}, level aggregate {}",
            self.instrument, order.id, order.side, order.price, order.quantity, aggregate
        );
        self.orders.insert(order.id, order);
    }

    /// Removes a tracked order from its level, dropping the level when it
    /// empties, and records the level change. The arena entry is the
    /// caller's to manage.
    pub(super) fn remove_resting(&mut self, order: &Order, outcome: &mut ApplyOutcome) {
        let side = order.side;
        let levels = self.side_mut(side);
        let mut aggregate = 0;
        let mut found = false;
        let mut empty = false;
        if let Some(level) = levels.get_mut(&order.price) {
            found = level.remove(order.id, order.quantity);
            aggregate = level.aggregate_quantity();
            empty = level.is_empty();
        }
        let mut level_removed = false;
        if empty {
            levels.remove(&order.price);
            level_removed = true;
            aggregate = 0;
        }
        if found {
            outcome.record_change(side, order.price, aggregate, level_removed);
        } else {
            error!(
                "book {}: order {} tracked but absent from level {} {}",
                self.instrument, order.id, side, order.price
            );
        }
    }

    /// Applies a fill to a resting order: reduces it in place or removes it
    /// when fully filled, maintaining its level and recording the change.
    pub(super) fn fill_resting(&mut self, order_id: OrderId, fill: u64, outcome: &mut ApplyOutcome) {
        let order = match self.orders.get_mut(&order_id) {
            Some(order) => {
                order.fill(fill);
                *order
            }
            None => {
                error!(
                    "book {}: fill for unknown order {order_id}",
                    self.instrument
                );
                return;
            }
        };
        if order.is_filled() {
            self.orders.remove(&order_id);
        }

        let levels = self.side_mut(order.side);
        let mut aggregate = 0;
        let mut found = false;
        let mut empty = false;
        if let Some(level) = levels.get_mut(&order.price) {
            found = true;
            if order.is_filled() {
                // Matching fills the head; venue prints can hit mid-queue.
                if level.front() == Some(order_id) {
                    level.pop_front(fill);
                } else {
                    level.remove(order_id, fill);
                }
            } else {
                level.reduce(fill);
            }
            aggregate = level.aggregate_quantity();
            empty = level.is_empty();
        }
        let mut level_removed = false;
        if empty {
            levels.remove(&order.price);
            level_removed = true;
            aggregate = 0;
        }
        if found {
            outcome.record_change(order.side, order.price, aggregate, level_removed);
        } else {
            error!(
                "book {}: filled order {order_id} had no level at {} {}",
                self.instrument, order.side, order.price
            );
        }
        if order.is_filled() {
            outcome.removed.push(order);
        }
    }

    fn notify_trades(&self, outcome: &ApplyOutcome) {
        if let Some(listener) = &self.trade_listener {
            for trade in &outcome.trades {
                listener(trade);
            }
        }
    }

    /// Verifies the book's structural invariants.
    ///
    /// Walks every level checking that aggregates equal the sum of member
    /// remaining quantities, that no level is empty, that each tracked
    /// order sits in exactly one level on the right side at the right
    /// price, and that the book is not crossed. Intended for periodic
    /// operational audits and for test harnesses; the hot path never calls
    /// this.
    ///
    /// # Errors
    ///
    /// Returns [`BookError::Validation`] naming the first violated
    /// invariant.
    pub fn audit(&self) -> Result<(), BookError> {
        let mut membership = 0usize;
        for (side, levels) in [(Side::Bid, &self.bids), (Side::Ask, &self.asks)] {
            for (price, level) in levels {
                if level.is_empty() {
                    return Err(BookError::validation(format!(
                        "empty level {side} {price} retained"
                    )));
                }
                let mut sum = 0u64;
                for order_id in level.order_ids() {
                    membership += 1;
                    let Some(order) = self.orders.get(&order_id) else {
                        return Err(BookError::validation(format!(
                            "level {side} {price} references unknown order {order_id}"
                        )));
                    };
                    if order.side != side || order.price != *price {
                        return Err(BookError::validation(format!(
                            "order {order_id} filed at {side} {price} but carries {} {}",
                            order.side, order.price
                        )));
                    }
                    if order.quantity == 0 {
                        return Err(BookError::validation(format!(
                            "order {order_id} resting with zero quantity"
                        )));
                    }
                    sum = sum.saturating_add(order.quantity);
                }
                if sum != level.aggregate_quantity() {
                    return Err(BookError::validation(format!(
                        "aggregate mismatch at {side} {price}: level says {}, orders sum to {sum}",
                        level.aggregate_quantity()
                    )));
                }
            }
        }
        if membership != self.orders.len() {
            return Err(BookError::validation(format!(
                "arena holds {} orders but levels reference {membership}",
                self.orders.len()
            )));
        }
        if let (Some((bid, _)), Some((ask, _))) = (self.best_bid(), self.best_ask()) {
            if bid >= ask {
                return Err(BookError::validation(format!(
                    "book is crossed: bid {bid} >= ask {ask}"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Book")
            .field("instrument", &self.instrument)
            .field("bid_levels", &self.bids.len())
            .field("ask_levels", &self.asks.len())
            .field("orders", &self.orders.len())
            .field("last_sequence", &self.last_sequence)
            .field("stale", &self.stale)
            .finish()
    }
}
