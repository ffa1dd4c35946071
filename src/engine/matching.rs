//! Crossing resolution for incoming orders.
//!
//! When an incoming order crosses the opposite side (bid at or above the
//! best ask, ask at or below the best bid), it fills against resting orders
//! before any remainder rests. The walk is strict price-time priority:
//! best opposing level first, head of the queue first within a level, on to
//! the next level only while the incoming limit still crosses it. Each
//! fill executes at the resting order's level price and emits one trade.

use crate::engine::book::{ApplyOutcome, Book};
use crate::engine::error::BookError;
use crate::engine::order::Order;
use crate::engine::trade::Trade;
use crate::engine::types::{OrderEvent, Side};
use either::Either;
use tracing::{error, trace};

#[inline]
fn crosses(side: Side, price: u64, opposite_best: u64) -> bool {
    match side {
        Side::Bid => price >= opposite_best,
        Side::Ask => price <= opposite_best,
    }
}

impl Book {
    /// Best price on `side`, if the side is non-empty.
    pub(super) fn best_price(&self, side: Side) -> Option<u64> {
        match side {
            Side::Bid => self.bids.last_key_value().map(|(price, _)| *price),
            Side::Ask => self.asks.first_key_value().map(|(price, _)| *price),
        }
    }

    /// Fills `incoming` against the opposite side while it crosses.
    ///
    /// On return the incoming order's remaining quantity is whatever could
    /// not execute; the caller decides whether that remainder rests or is
    /// discarded. Resting orders are reduced or removed through the usual
    /// fill path, so every touched level is recorded in `outcome`.
    pub(super) fn execute_crossing(
        &mut self,
        event: &OrderEvent,
        incoming: &mut Order,
        outcome: &mut ApplyOutcome,
    ) {
        let opposite = incoming.side.opposite();
        while incoming.quantity > 0 {
            let Some(best) = self.best_price(opposite) else {
                break;
            };
            if !crosses(incoming.side, incoming.price, best) {
                break;
            }
            self.match_at_level(event, incoming, best, outcome);
        }
    }

    /// Fills `incoming` against the queue at one opposing level, head
    /// first, until the incoming order or the level is exhausted. The
    /// level is removed by the fill path when its last order departs.
    fn match_at_level(
        &mut self,
        event: &OrderEvent,
        incoming: &mut Order,
        level_price: u64,
        outcome: &mut ApplyOutcome,
    ) {
        let opposite = incoming.side.opposite();
        while incoming.quantity > 0 {
            let Some(resting_id) = self
                .side(opposite)
                .get(&level_price)
                .and_then(|level| level.front())
            else {
                break;
            };
            let Some(resting) = self.orders.get(&resting_id).copied() else {
                // Dangling identifier in the queue wedges the level; drop
                // it and keep matching.
                error!(
                    "book {}: level {} {} queued unknown order {}",
                    self.instrument, opposite, level_price, resting_id
                );
                let emptied = match self.side_mut(opposite).get_mut(&level_price) {
                    Some(level) => {
                        level.remove(resting_id, 0);
                        level.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    self.side_mut(opposite).remove(&level_price);
                }
                continue;
            };

            let fill = incoming.quantity.min(resting.quantity);
            incoming.fill(fill);
            outcome.trades.push(Trade {
                instrument: self.instrument,
                price: level_price,
                quantity: fill,
                aggressor_order_id: Some(incoming.id),
                resting_order_id: resting_id,
                aggressor_side: incoming.side,
                sequence: event.sequence,
                timestamp_ns: event.timestamp_ns,
            });
            trace!(
                "book {}: matched {} @ {} aggressor {} against resting {}",
                self.instrument, fill, level_price, incoming.id, resting_id
            );
            self.fill_resting(resting_id, fill, outcome);
        }
    }

    /// True when the opposing side holds at least `quantity` within the
    /// incoming limit. Used as the fill-or-kill pre-check so a failed
    /// fill-or-kill leaves the book untouched.
    pub(super) fn can_fill_completely(&self, side: Side, price: u64, quantity: u64) -> bool {
        let crossing = match side {
            Side::Bid => Either::Left(
                self.asks
                    .range(..=price)
                    .map(|(_, level)| level.aggregate_quantity()),
            ),
            Side::Ask => Either::Right(
                self.bids
                    .range(price..)
                    .map(|(_, level)| level.aggregate_quantity()),
            ),
        };
        let mut remaining = quantity;
        for available in crossing {
            remaining = remaining.saturating_sub(available);
            if remaining == 0 {
                return true;
            }
        }
        false
    }

    /// Resolves a market order to a limit at the worst opposing price: the
    /// highest ask for a buy, the lowest bid for a sell. With the opposite
    /// side empty there is no price to convert to, so the order is
    /// rejected.
    pub(super) fn resolve_market_price(&self, side: Side) -> Result<u64, BookError> {
        let worst = match side {
            Side::Bid => self.asks.last_key_value().map(|(price, _)| *price),
            Side::Ask => self.bids.first_key_value().map(|(price, _)| *price),
        };
        worst.ok_or_else(|| {
            BookError::validation(format!(
                "market {side} order with empty opposite side"
            ))
        })
    }
}
