//! Shared event constructors for engine tests.

use crate::engine::types::{EventKind, InstrumentId, OrderEvent, OrderId, Side, TimeInForce};

pub const INSTRUMENT: InstrumentId = InstrumentId(1);

pub fn add(sequence: u64, order_id: u64, side: Side, price: u64, quantity: u64) -> OrderEvent {
    add_tif(sequence, order_id, side, price, quantity, TimeInForce::Gtc)
}

pub fn add_tif(
    sequence: u64,
    order_id: u64,
    side: Side,
    price: u64,
    quantity: u64,
    time_in_force: TimeInForce,
) -> OrderEvent {
    OrderEvent {
        instrument: INSTRUMENT,
        sequence,
        timestamp_ns: sequence * 1_000,
        kind: EventKind::Add {
            order_id: OrderId(order_id),
            venue_order_id: order_id,
            side,
            price,
            quantity,
            time_in_force,
        },
    }
}

pub fn modify(sequence: u64, order_id: u64, new_price: u64, new_quantity: u64) -> OrderEvent {
    OrderEvent {
        instrument: INSTRUMENT,
        sequence,
        timestamp_ns: sequence * 1_000,
        kind: EventKind::Modify {
            order_id: OrderId(order_id),
            new_price,
            new_quantity,
        },
    }
}

pub fn cancel(sequence: u64, order_id: u64) -> OrderEvent {
    OrderEvent {
        instrument: INSTRUMENT,
        sequence,
        timestamp_ns: sequence * 1_000,
        kind: EventKind::Cancel {
            order_id: OrderId(order_id),
        },
    }
}

pub fn venue_trade(sequence: u64, order_id: u64, quantity: u64) -> OrderEvent {
    OrderEvent {
        instrument: INSTRUMENT,
        sequence,
        timestamp_ns: sequence * 1_000,
        kind: EventKind::Trade {
            order_id: OrderId(order_id),
            quantity,
        },
    }
}
