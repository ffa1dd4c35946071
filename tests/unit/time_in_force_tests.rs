#[cfg(test)]
mod tests_time_in_force {
    use bookbuilder_rs::prelude::*;

    fn add_tif(
        sequence: u64,
        order_id: u64,
        side: Side,
        price: u64,
        quantity: u64,
        time_in_force: TimeInForce,
    ) -> OrderEvent {
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
                time_in_force,
            },
        }
    }

    fn gtc(sequence: u64, order_id: u64, side: Side, price: u64, quantity: u64) -> OrderEvent {
        add_tif(sequence, order_id, side, price, quantity, TimeInForce::Gtc)
    }

    fn context() -> InstrumentContext {
        InstrumentContext::new(InstrumentId(1), &EngineConfig::default())
    }

    #[test]
    fn gtc_remainder_rests() {
        let mut ctx = context();
        ctx.process(gtc(1, 1, Side::Ask, 100, 5)).expect("ask");
        ctx.process(gtc(2, 2, Side::Bid, 100, 8)).expect("cross");

        assert_eq!(ctx.book().best_bid(), Some((100, 3)));
        assert_eq!(ctx.stats().trades_emitted, 1);
    }

    #[test]
    fn ioc_remainder_never_rests() {
        let mut ctx = context();
        ctx.process(gtc(1, 1, Side::Ask, 100, 5)).expect("ask");
        let outcome = ctx
            .process(add_tif(2, 2, Side::Bid, 100, 8, TimeInForce::Ioc))
            .expect("ioc");

        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].quantity, 5);
        assert_eq!(ctx.book().best_bid(), None);
        assert_eq!(ctx.book().order_count(), 0);
    }

    #[test]
    fn fok_is_all_or_nothing() {
        let mut ctx = context();
        ctx.process(gtc(1, 1, Side::Ask, 100, 3)).expect("ask");
        ctx.process(gtc(2, 2, Side::Ask, 101, 2)).expect("ask");

        // Short one lot: killed, book untouched.
        let outcome = ctx
            .process(add_tif(3, 3, Side::Bid, 101, 6, TimeInForce::Fok))
            .expect("killed");
        assert!(outcome.trades.is_empty());
        assert_eq!(ctx.book().order_count(), 2);
        assert_eq!(ctx.book().best_ask(), Some((100, 3)));

        // Exactly covered: fills through both levels.
        let outcome = ctx
            .process(add_tif(4, 4, Side::Bid, 101, 5, TimeInForce::Fok))
            .expect("filled");
        assert_eq!(outcome.trades.len(), 2);
        assert_eq!(ctx.book().order_count(), 0);
        assert_eq!(ctx.book().best_ask(), None);
    }

    #[test]
    fn market_order_takes_what_is_there_and_discards_the_rest() {
        let mut ctx = context();
        ctx.process(gtc(1, 1, Side::Ask, 100, 3)).expect("ask");
        ctx.process(gtc(2, 2, Side::Ask, 104, 2)).expect("ask");

        let outcome = ctx
            .process(add_tif(3, 3, Side::Bid, 0, 9, TimeInForce::Market))
            .expect("market");
        let fills: Vec<(u64, u64)> = outcome
            .trades
            .iter()
            .map(|t| (t.price, t.quantity))
            .collect();
        assert_eq!(fills, vec![(100, 3), (104, 2)]);

        // No remainder rests anywhere.
        assert_eq!(ctx.book().best_bid(), None);
        assert_eq!(ctx.book().best_ask(), None);
        assert_eq!(ctx.book().order_count(), 0);
    }

    #[test]
    fn market_against_empty_side_is_rejected_but_consumes_its_slot() {
        let mut ctx = context();
        let err = ctx
            .process(add_tif(1, 1, Side::Bid, 0, 5, TimeInForce::Market))
            .expect_err("nothing to price against");
        assert!(matches!(err, BookError::Validation { .. }));
        assert_eq!(ctx.stats().validation_rejects, 1);

        // The sequence slot was spent at the gate; the feed continues.
        assert_eq!(ctx.expected_sequence(), 2);
        ctx.process(gtc(2, 2, Side::Bid, 100, 5)).expect("continues");
    }

    #[test]
    fn market_order_carrying_a_price_is_rejected_at_the_gate() {
        let mut ctx = context();
        let err = ctx
            .process(add_tif(1, 1, Side::Bid, 50, 5, TimeInForce::Market))
            .expect_err("priced market order");
        assert!(matches!(err, BookError::Validation { .. }));
        assert_eq!(ctx.expected_sequence(), 2);
    }
}
