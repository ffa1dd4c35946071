#[cfg(test)]
mod tests_book_properties {
    use bookbuilder_rs::prelude::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Add {
            order_id: u64,
            side: Side,
            price: u64,
            quantity: u64,
            time_in_force: TimeInForce,
        },
        Modify {
            order_id: u64,
            new_price: u64,
            new_quantity: u64,
        },
        Cancel {
            order_id: u64,
        },
    }

    fn arb_side() -> impl Strategy<Value = Side> {
        prop_oneof![Just(Side::Bid), Just(Side::Ask)]
    }

    fn arb_price() -> impl Strategy<Value = u64> {
        90u64..=110
    }

    fn arb_quantity() -> impl Strategy<Value = u64> {
        1u64..=20
    }

    fn arb_time_in_force() -> impl Strategy<Value = TimeInForce> {
        prop_oneof![
            5 => Just(TimeInForce::Gtc),
            2 => Just(TimeInForce::Ioc),
            1 => Just(TimeInForce::Fok),
            1 => Just(TimeInForce::Market),
        ]
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            6 => (1u64..=20, arb_side(), arb_price(), arb_quantity(), arb_time_in_force())
                .prop_map(|(order_id, side, price, quantity, time_in_force)| Op::Add {
                    order_id,
                    side,
                    price,
                    quantity,
                    time_in_force,
                }),
            2 => (1u64..=20, arb_price(), arb_quantity()).prop_map(
                |(order_id, new_price, new_quantity)| Op::Modify {
                    order_id,
                    new_price,
                    new_quantity,
                }
            ),
            2 => (1u64..=20).prop_map(|order_id| Op::Cancel { order_id }),
        ]
    }

    fn arb_stream() -> impl Strategy<Value = Vec<Op>> {
        proptest::collection::vec(arb_op(), 1..40)
    }

    fn to_event(sequence: u64, op: &Op) -> OrderEvent {
        let kind = match *op {
            Op::Add {
                order_id,
                side,
                price,
                quantity,
                time_in_force,
            } => EventKind::Add {
                order_id: OrderId(order_id),
                venue_order_id: order_id,
                side,
                price: if time_in_force == TimeInForce::Market { 0 } else { price },
                quantity,
                time_in_force,
            },
            Op::Modify {
                order_id,
                new_price,
                new_quantity,
            } => EventKind::Modify {
                order_id: OrderId(order_id),
                new_price,
                new_quantity,
            },
            Op::Cancel { order_id } => EventKind::Cancel {
                order_id: OrderId(order_id),
            },
        };
        OrderEvent {
            instrument: InstrumentId(1),
            sequence,
            timestamp_ns: sequence * 1_000,
            kind,
        }
    }

    fn replay(ops: &[Op]) -> Book {
        let mut book = Book::new(InstrumentId(1));
        for (index, op) in ops.iter().enumerate() {
            // Rejections (duplicate ids, unknown orders) are part of the
            // stream; the sequence keeps advancing past them.
            let _ = book.apply(to_event(index as u64 + 1, op));
        }
        book
    }

    proptest! {
        #[test]
        fn book_survives_any_stream(ops in arb_stream()) {
            let book = replay(&ops);
            prop_assert!(book.audit().is_ok());
        }

        #[test]
        fn book_never_rests_crossed(ops in arb_stream()) {
            let book = replay(&ops);
            if let (Some((bid, _)), Some((ask, _))) = (book.best_bid(), book.best_ask()) {
                prop_assert!(bid < ask);
            }
        }

        #[test]
        fn replay_is_deterministic(ops in arb_stream()) {
            let first = replay(&ops).snapshot();
            let second = replay(&ops).snapshot();
            prop_assert_eq!(first.last_sequence, second.last_sequence);
            prop_assert_eq!(first.bids, second.bids);
            prop_assert_eq!(first.asks, second.asks);
        }

        #[test]
        fn snapshot_levels_are_ordered_and_consistent(ops in arb_stream()) {
            let snapshot = replay(&ops).snapshot();

            let bid_prices: Vec<u64> = snapshot.bids.iter().map(|l| l.price).collect();
            let mut descending = bid_prices.clone();
            descending.sort_unstable_by(|a, b| b.cmp(a));
            prop_assert_eq!(&bid_prices, &descending);

            let ask_prices: Vec<u64> = snapshot.asks.iter().map(|l| l.price).collect();
            let mut ascending = ask_prices.clone();
            ascending.sort_unstable();
            prop_assert_eq!(&ask_prices, &ascending);

            for level in snapshot.bids.iter().chain(snapshot.asks.iter()) {
                let member_sum: u64 = level.orders.iter().map(|o| o.quantity).sum();
                prop_assert_eq!(level.aggregate_quantity, member_sum);
                prop_assert!(!level.orders.is_empty());

                // Queue order within a level follows arrival order.
                let sequences: Vec<u64> = level.orders.iter().map(|o| o.sequence).collect();
                let mut sorted = sequences.clone();
                sorted.sort_unstable();
                prop_assert_eq!(&sequences, &sorted);
            }
        }

        #[test]
        fn restore_reproduces_any_book(ops in arb_stream()) {
            let original = replay(&ops);
            let package = SnapshotPackage::new(original.snapshot());
            prop_assert!(package.is_ok());

            let mut replica = Book::new(InstrumentId(1));
            if let Ok(package) = package {
                let verified = package.into_snapshot();
                prop_assert!(verified.is_ok());
                if let Ok(snapshot) = verified {
                    prop_assert!(replica.restore(&snapshot).is_ok());
                }
            }
            prop_assert_eq!(replica.last_sequence(), original.last_sequence());
            prop_assert_eq!(replica.order_count(), original.order_count());
            prop_assert_eq!(replica.depth(0), original.depth(0));
        }

        #[test]
        fn fills_never_exceed_the_incoming_quantity(ops in arb_stream()) {
            let mut book = Book::new(InstrumentId(1));
            for (index, op) in ops.iter().enumerate() {
                let event = to_event(index as u64 + 1, op);
                let quantity_in = match event.kind {
                    EventKind::Add { quantity, .. } => Some(quantity),
                    _ => None,
                };
                if let Ok(outcome) = book.apply(event) {
                    if let Some(quantity) = quantity_in {
                        let filled: u64 = outcome.trades.iter().map(|t| t.quantity).sum();
                        prop_assert!(filled <= quantity);
                    }
                }
            }
        }
    }
}
