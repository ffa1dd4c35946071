//! Single-writer execution context for one instrument.
//!
//! An [`InstrumentContext`] owns the full per-instrument pipeline: the
//! sequence gate, the book, and the publisher. Exactly one task or thread
//! drives it, so nothing here locks. The context's [`process`] method is
//! the hot path: gate, apply, publish, all synchronous.
//!
//! [`process`]: InstrumentContext::process

use crate::engine::book::{ApplyOutcome, Book};
use crate::engine::config::EngineConfig;
use crate::engine::depth::DepthView;
use crate::engine::error::BookError;
use crate::engine::ingestor::{IngestOutcome, Ingestor};
use crate::engine::publisher::{FeedFlags, Publisher, Subscription};
use crate::engine::snapshot::{SnapshotError, SnapshotPackage};
use crate::engine::trade::TradeListener;
use crate::engine::types::{InstrumentId, OrderEvent};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Counters describing everything a context has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStats {
    /// Events applied to the book.
    pub events_processed: u64,
    /// Executions emitted by applied events.
    pub trades_emitted: u64,
    /// Redelivered events dropped by the sequence gate.
    pub duplicates_dropped: u64,
    /// Events rejected for malformed payloads.
    pub validation_rejects: u64,
    /// Events referencing orders the book does not hold.
    pub unknown_orders: u64,
    /// Sequence gaps detected. Each one stales the book until a snapshot
    /// is installed.
    pub gaps_detected: u64,
}

/// The full pipeline for one instrument.
pub struct InstrumentContext {
    book: Book,
    ingestor: Ingestor,
    publisher: Publisher,
    stats: ContextStats,
}

impl InstrumentContext {
    /// Creates a context with an empty book expecting sequence 1.
    #[must_use]
    pub fn new(instrument: InstrumentId, config: &EngineConfig) -> Self {
        Self {
            book: Book::new(instrument),
            ingestor: Ingestor::new(instrument),
            publisher: Publisher::new(instrument, config.subscriber_queue_capacity),
            stats: ContextStats::default(),
        }
    }

    /// Creates a context whose book notifies `listener` of every trade.
    #[must_use]
    pub fn with_trade_listener(
        instrument: InstrumentId,
        config: &EngineConfig,
        listener: TradeListener,
    ) -> Self {
        let mut context = Self::new(instrument, config);
        context.book = Book::with_trade_listener(instrument, listener);
        context
    }

    /// The instrument this context serves.
    #[must_use]
    #[inline]
    pub fn instrument(&self) -> InstrumentId {
        self.book.instrument()
    }

    /// Read access to the book, for queries.
    #[must_use]
    pub fn book(&self) -> &Book {
        &self.book
    }

    /// Counters accumulated since creation.
    #[must_use]
    pub fn stats(&self) -> ContextStats {
        self.stats
    }

    /// True while the instrument awaits a snapshot after a gap.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.book.is_stale()
    }

    /// The sequence number the next inbound event must carry.
    #[must_use]
    pub fn expected_sequence(&self) -> u64 {
        self.ingestor.expected_sequence()
    }

    /// Sequence of the most recently published delta.
    #[must_use]
    pub fn publish_sequence(&self) -> u64 {
        self.publisher.publish_sequence()
    }

    /// Attaches a subscriber to this instrument's outbound feed.
    pub fn subscribe(&mut self, flags: FeedFlags) -> Subscription {
        self.publisher.subscribe(flags)
    }

    /// Per-side aggregate view of the top `depth` levels. Zero means no
    /// truncation at this layer; the engine clamps before calling.
    #[must_use]
    pub fn depth(&self, depth: usize) -> DepthView {
        self.book.depth(depth)
    }

    /// Drives one event through gate, book, and publisher.
    ///
    /// Duplicates are absorbed and reported as an empty outcome. On a
    /// sequence gap the book is marked stale and every subscriber gets a
    /// resync marker; the error is still returned so the caller can fetch
    /// a snapshot.
    ///
    /// # Errors
    ///
    /// Propagates [`BookError`] from the gate or the book. Recoverable
    /// errors (`Validation`, `UnknownOrder`) leave the context processable.
    pub fn process(&mut self, event: OrderEvent) -> Result<ApplyOutcome, BookError> {
        let event = match self.ingestor.accept(event) {
            Ok(IngestOutcome::Forward(event)) => event,
            Ok(IngestOutcome::Duplicate { .. }) => {
                self.stats.duplicates_dropped += 1;
                return Ok(ApplyOutcome::default());
            }
            Err(err) => {
                self.note_failure(&err);
                return Err(err);
            }
        };

        match self.book.apply(event) {
            Ok(outcome) => {
                self.stats.events_processed += 1;
                self.stats.trades_emitted += outcome.trades.len() as u64;
                self.publisher.publish(&outcome);
                Ok(outcome)
            }
            Err(err) => {
                self.note_failure(&err);
                Err(err)
            }
        }
    }

    /// Packages the current book state for transfer or archival.
    ///
    /// # Errors
    ///
    /// Propagates [`SnapshotError::Encode`] from checksumming.
    pub fn snapshot_package(&self) -> Result<SnapshotPackage, SnapshotError> {
        SnapshotPackage::new(self.book.snapshot())
    }

    /// Validates a packaged snapshot, rebuilds the book from it, and
    /// re-anchors the sequence gate after it.
    ///
    /// This is the only way out of the stale state.
    ///
    /// # Errors
    ///
    /// Propagates [`SnapshotError`] from validation or restore; the gate
    /// is left untouched on failure.
    pub fn install_snapshot(&mut self, package: SnapshotPackage) -> Result<(), SnapshotError> {
        let snapshot = package.into_snapshot()?;
        self.book.restore(&snapshot)?;
        self.ingestor.resync(snapshot.last_sequence);
        Ok(())
    }

    fn note_failure(&mut self, err: &BookError) {
        match err {
            BookError::Validation { .. } => self.stats.validation_rejects += 1,
            BookError::UnknownOrder { order_id } => {
                self.stats.unknown_orders += 1;
                warn!(
                    "context {}: event referenced unknown order {order_id}, possible desync",
                    self.instrument()
                );
            }
            BookError::SequenceGap { .. } => {
                self.stats.gaps_detected += 1;
                self.book.mark_stale();
                self.publisher.broadcast_resync();
            }
            BookError::Stale { .. } => {}
        }
    }
}
