#[cfg(test)]
mod tests_depth_queries {
    use bookbuilder_rs::prelude::*;

    fn add(sequence: u64, order_id: u64, side: Side, price: u64, quantity: u64) -> OrderEvent {
        OrderEvent {
            instrument: InstrumentId(1),
            sequence,
            timestamp_ns: sequence * 1_000,
            kind: EventKind::Add {
                order_id: OrderId(order_id),
                venue_order_id: order_id,
                side,
                price,
                quantity,
                time_in_force: TimeInForce::Gtc,
            },
        }
    }

    fn ladder() -> Book {
        let mut book = Book::new(InstrumentId(1));
        book.apply(add(1, 1, Side::Bid, 100, 10)).expect("bid");
        book.apply(add(2, 2, Side::Bid, 98, 5)).expect("bid");
        book.apply(add(3, 3, Side::Bid, 102, 3)).expect("bid");
        book.apply(add(4, 4, Side::Ask, 105, 7)).expect("ask");
        book.apply(add(5, 5, Side::Ask, 103, 2)).expect("ask");
        book
    }

    #[test]
    fn levels_iterate_best_price_first() {
        let book = ladder();
        let bids: Vec<(u64, u64)> = book
            .levels(Side::Bid)
            .map(|l| (l.price, l.quantity))
            .collect();
        assert_eq!(bids, vec![(102, 3), (100, 10), (98, 5)]);

        let asks: Vec<(u64, u64)> = book
            .levels(Side::Ask)
            .map(|l| (l.price, l.quantity))
            .collect();
        assert_eq!(asks, vec![(103, 2), (105, 7)]);
    }

    #[test]
    fn depth_truncates_each_side_independently() {
        let book = ladder();

        let top = book.depth(2);
        assert_eq!(top.instrument, InstrumentId(1));
        assert_eq!(top.last_sequence, 5);
        assert_eq!(top.bids.len(), 2);
        assert_eq!(top.asks.len(), 2);
        assert_eq!(top.bids[0].price, 102);
        assert_eq!(top.asks[0].price, 103);

        let full = book.depth(0);
        assert_eq!(full.bids.len(), 3);
        assert_eq!(full.asks.len(), 2);
    }

    #[test]
    fn level_views_count_queued_orders() {
        let mut book = ladder();
        book.apply(add(6, 6, Side::Bid, 100, 4)).expect("bid");

        let level = book
            .levels(Side::Bid)
            .find(|l| l.price == 100)
            .expect("level");
        assert_eq!(level.quantity, 14);
        assert_eq!(level.order_count, 2);
    }
}

#[cfg(test)]
mod tests_book_analytics {
    use bookbuilder_rs::prelude::*;

    fn add(sequence: u64, order_id: u64, side: Side, price: u64, quantity: u64) -> OrderEvent {
        OrderEvent {
            instrument: InstrumentId(1),
            sequence,
            timestamp_ns: sequence * 1_000,
            kind: EventKind::Add {
                order_id: OrderId(order_id),
                venue_order_id: order_id,
                side,
                price,
                quantity,
                time_in_force: TimeInForce::Gtc,
            },
        }
    }

    #[test]
    fn mid_price_and_spread_need_both_sides() {
        let mut book = Book::new(InstrumentId(1));
        assert_eq!(book.mid_price(), None);
        assert_eq!(book.spread(), None);

        book.apply(add(1, 1, Side::Bid, 100, 10)).expect("bid");
        assert_eq!(book.mid_price(), None);

        book.apply(add(2, 2, Side::Ask, 104, 5)).expect("ask");
        assert_eq!(book.mid_price(), Some(102.0));
        assert_eq!(book.spread(), Some(4));
    }

    #[test]
    fn vwap_weights_price_by_resting_volume() {
        let mut book = Book::new(InstrumentId(1));
        book.apply(add(1, 1, Side::Ask, 100, 10)).expect("ask");
        book.apply(add(2, 2, Side::Ask, 110, 30)).expect("ask");

        assert_eq!(book.vwap(Side::Ask, 0), Some(107.5));
        assert_eq!(book.vwap(Side::Ask, 1), Some(100.0));
        assert_eq!(book.vwap(Side::Bid, 0), None);
    }

    #[test]
    fn imbalance_is_signed_buy_pressure() {
        let mut book = Book::new(InstrumentId(1));
        assert_eq!(book.imbalance(0), None);

        book.apply(add(1, 1, Side::Bid, 100, 30)).expect("bid");
        book.apply(add(2, 2, Side::Ask, 105, 10)).expect("ask");
        assert_eq!(book.imbalance(0), Some(0.5));

        book.apply(add(3, 3, Side::Ask, 106, 40)).expect("ask");
        assert_eq!(book.imbalance(0), Some(-0.25));
        // Depth one sees only the touch.
        assert_eq!(book.imbalance(1), Some(0.5));
    }

    #[test]
    fn side_volume_totals_resting_quantity() {
        let mut book = Book::new(InstrumentId(1));
        book.apply(add(1, 1, Side::Bid, 100, 10)).expect("bid");
        book.apply(add(2, 2, Side::Bid, 99, 5)).expect("bid");
        book.apply(add(3, 3, Side::Ask, 105, 7)).expect("ask");

        assert_eq!(book.side_volume(Side::Bid), 15);
        assert_eq!(book.side_volume(Side::Ask), 7);

        // A fill drains the touch and the totals follow.
        book.apply(add(4, 4, Side::Ask, 100, 10)).expect("cross");
        assert_eq!(book.side_volume(Side::Bid), 5);
        assert_eq!(book.side_volume(Side::Ask), 7);
    }
}
