#[cfg(test)]
mod tests_resync {
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

    fn context() -> InstrumentContext {
        InstrumentContext::new(InstrumentId(1), &EngineConfig::default())
    }

    #[test]
    fn duplicates_are_dropped_and_counted() {
        let mut ctx = context();
        ctx.process(add(1, 1, Side::Bid, 100, 10)).expect("first");
        let outcome = ctx.process(add(1, 1, Side::Bid, 100, 10)).expect("replay");

        assert!(outcome.is_empty());
        assert_eq!(ctx.stats().duplicates_dropped, 1);
        assert_eq!(ctx.stats().events_processed, 1);
        assert_eq!(ctx.book().best_bid(), Some((100, 10)));
    }

    #[test]
    fn gap_statistics_and_stale_latch() {
        let mut ctx = context();
        ctx.process(add(1, 1, Side::Bid, 100, 10)).expect("seeded");

        let err = ctx.process(add(3, 3, Side::Bid, 101, 5)).expect_err("gap");
        assert!(matches!(err, BookError::SequenceGap { expected: 2, got: 3, .. }));
        assert_eq!(ctx.stats().gaps_detected, 1);
        assert!(ctx.is_stale());

        // Everything after the gap bounces until a snapshot arrives, even
        // the event that would have been next in line.
        let err = ctx.process(add(2, 2, Side::Bid, 100, 5)).expect_err("stale");
        assert!(matches!(err, BookError::Stale { .. }));
        assert_eq!(ctx.stats().gaps_detected, 1);
        assert_eq!(ctx.stats().events_processed, 1);
    }

    #[test]
    fn snapshot_install_reopens_the_feed() {
        let mut source = context();
        for sequence in 1..=4 {
            source
                .process(add(sequence, sequence, Side::Bid, 99 + sequence, 10))
                .expect("source event");
        }
        let package = source.snapshot_package().expect("package");

        let mut ctx = context();
        ctx.process(add(1, 10, Side::Bid, 50, 1)).expect("seeded");
        ctx.process(add(3, 11, Side::Bid, 51, 1)).expect_err("gap");
        assert!(ctx.is_stale());

        ctx.install_snapshot(package).expect("install");
        assert!(!ctx.is_stale());
        assert_eq!(ctx.expected_sequence(), 5);
        assert_eq!(ctx.book().best_bid(), Some((103, 10)));

        // The pre-gap order from the old life is gone; the feed resumes
        // from the snapshot's sequence.
        assert!(ctx.book().get_order(OrderId(10)).is_none());
        ctx.process(add(5, 5, Side::Bid, 104, 2)).expect("resumed");
        assert_eq!(ctx.book().best_bid(), Some((104, 2)));
    }

    #[test]
    fn slow_subscriber_gets_a_marker_then_reanchors() {
        let config = EngineConfig::default().with_subscriber_queue_capacity(2);
        let mut ctx = InstrumentContext::new(InstrumentId(1), &config);
        let mut feed = ctx.subscribe(FeedFlags::LEVEL_DELTAS);

        // Three deltas against a queue of two: the third is lost.
        ctx.process(add(1, 1, Side::Bid, 100, 10)).expect("event");
        ctx.process(add(2, 2, Side::Bid, 101, 5)).expect("event");
        ctx.process(add(3, 3, Side::Bid, 102, 7)).expect("event");

        let first = feed.try_recv().expect("first delta");
        let second = feed.try_recv().expect("second delta");
        assert!(matches!(first, FeedMessage::Delta(d) if d.publish_sequence == 1));
        assert!(matches!(second, FeedMessage::Delta(d) if d.publish_sequence == 2));
        assert!(feed.try_recv().is_none());

        // The next publication announces the hole before carrying on.
        ctx.process(add(4, 4, Side::Bid, 103, 9)).expect("event");
        assert!(matches!(
            feed.try_recv(),
            Some(FeedMessage::ResyncRequired { instrument: InstrumentId(1) })
        ));
        let resumed = feed.try_recv().expect("delta after marker");
        assert!(matches!(resumed, FeedMessage::Delta(d) if d.publish_sequence == 4));

        // A fresh snapshot covers everything the subscriber missed.
        let snapshot = ctx
            .snapshot_package()
            .expect("package")
            .into_snapshot()
            .expect("verified");
        let bids: Vec<u64> = snapshot.bids.iter().map(|level| level.price).collect();
        assert_eq!(bids, vec![103, 102, 101, 100]);
    }

    #[test]
    fn unaffected_subscribers_keep_their_stream() {
        let config = EngineConfig::default().with_subscriber_queue_capacity(2);
        let mut ctx = InstrumentContext::new(InstrumentId(1), &config);
        let mut slow = ctx.subscribe(FeedFlags::LEVEL_DELTAS);
        let mut fast = ctx.subscribe(FeedFlags::LEVEL_DELTAS);

        for sequence in 1..=3 {
            ctx.process(add(sequence, sequence, Side::Bid, 99 + sequence, 10))
                .expect("event");
            // The fast subscriber drains as it goes and never overflows.
            assert!(matches!(
                fast.try_recv(),
                Some(FeedMessage::Delta(d)) if d.publish_sequence == sequence
            ));
        }

        // Drain the stalled stream, then publish once more: only that
        // stream carries the marker.
        slow.try_recv().expect("first");
        slow.try_recv().expect("second");
        assert!(slow.try_recv().is_none());

        ctx.process(add(4, 4, Side::Bid, 104, 1)).expect("event");
        assert!(matches!(
            fast.try_recv(),
            Some(FeedMessage::Delta(d)) if d.publish_sequence == 4
        ));
        assert!(matches!(
            slow.try_recv(),
            Some(FeedMessage::ResyncRequired { .. })
        ));
        assert!(matches!(
            slow.try_recv(),
            Some(FeedMessage::Delta(d)) if d.publish_sequence == 4
        ));
    }
}
