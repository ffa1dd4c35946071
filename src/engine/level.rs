//! A single price level holding its order queue in arrival order.

use crate::engine::types::OrderId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One price level on one side of the book.
///
/// The level stores order identifiers only; the orders themselves live in
/// the book's arena. Queue position is strict arrival order: new orders
/// join at the tail, matching consumes from the head, and nothing reorders
/// the queue in between. `aggregate_quantity` tracks the sum of the member
/// orders' remaining quantities and is maintained incrementally by the
/// book, which passes every quantity delta through this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price of this level in ticks.
    price: u64,
    /// Member order identifiers, head = earliest arrival.
    orders: VecDeque<OrderId>,
    /// Sum of member orders' remaining quantities.
    aggregate_quantity: u64,
}

impl PriceLevel {
    /// Creates an empty level at `price`.
    #[must_use]
    pub fn new(price: u64) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
            aggregate_quantity: 0,
        }
    }

    /// The price of this level in ticks.
    #[must_use]
    #[inline]
    pub fn price(&self) -> u64 {
        self.price
    }

    /// Sum of member orders' remaining quantities.
    #[must_use]
    #[inline]
    pub fn aggregate_quantity(&self) -> u64 {
        self.aggregate_quantity
    }

    /// Number of orders queued at this level.
    #[must_use]
    #[inline]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// True when no orders remain. The book removes empty levels
    /// immediately, so observable levels are never empty.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// The identifier at the head of the queue, if any.
    #[must_use]
    pub fn front(&self) -> Option<OrderId> {
        self.orders.front().copied()
    }

    /// Iterates member identifiers in queue order, head first.
    pub fn order_ids(&self) -> impl Iterator<Item = OrderId> + '_ {
        self.orders.iter().copied()
    }

    /// Appends an order at the tail of the queue.
    pub(crate) fn push_back(&mut self, order_id: OrderId, quantity: u64) {
        self.orders.push_back(order_id);
        self.aggregate_quantity = self.aggregate_quantity.saturating_add(quantity);
    }

    /// Removes an order from anywhere in the queue.
    ///
    /// Returns `false` if the identifier was not queued here; the aggregate
    /// is untouched in that case.
    pub(crate) fn remove(&mut self, order_id: OrderId, quantity: u64) -> bool {
        let Some(position) = self.orders.iter().position(|id| *id == order_id) else {
            return false;
        };
        self.orders.remove(position);
        self.aggregate_quantity = self.aggregate_quantity.saturating_sub(quantity);
        true
    }

    /// Removes the head of the queue after a full fill.
    pub(crate) fn pop_front(&mut self, quantity: u64) -> Option<OrderId> {
        let order_id = self.orders.pop_front()?;
        self.aggregate_quantity = self.aggregate_quantity.saturating_sub(quantity);
        Some(order_id)
    }

    /// Reduces the aggregate after a partial fill or in-place quantity
    /// decrease. The order keeps its queue position.
    pub(crate) fn reduce(&mut self, quantity: u64) {
        self.aggregate_quantity = self.aggregate_quantity.saturating_sub(quantity);
    }
}
