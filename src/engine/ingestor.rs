//! Sequence validation gate in front of a book.
//!
//! The ingestor admits canonical events strictly in sequence order. For an
//! instrument whose next expected sequence is `n`, exactly the event with
//! sequence `n` passes through; anything below is a duplicate delivery and
//! is dropped, anything above proves at least one event was lost and
//! latches the gap. Once gapped, the ingestor refuses the rest of the feed
//! until [`resync`](Ingestor::resync) re-anchors it on a fresh snapshot.
//! Sequence numbers are authoritative for ordering; timestamps are carried
//! but never consulted.

use crate::engine::error::BookError;
use crate::engine::types::{EventKind, InstrumentId, OrderEvent, TimeInForce};
use tracing::{error, info, warn};

/// What the ingestor decided about an admitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The event is exactly-next and well-formed; apply it to the book.
    Forward(OrderEvent),
    /// The event's sequence was already consumed. Dropped, not an error:
    /// upstream feeds may redeliver on reconnect.
    Duplicate {
        /// The redelivered sequence number.
        sequence: u64,
    },
}

/// Per-instrument sequence gate.
///
/// Owned by the same execution context as the instrument's book and driven
/// synchronously before every apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingestor {
    instrument: InstrumentId,
    /// Next sequence number this instrument's feed must produce.
    expected: u64,
    /// Latched by a gap; cleared only by [`resync`](Self::resync).
    gapped: bool,
}

impl Ingestor {
    /// Creates a gate expecting sequence 1, the first event of a feed.
    #[must_use]
    pub fn new(instrument: InstrumentId) -> Self {
        Self {
            instrument,
            expected: 1,
            gapped: false,
        }
    }

    /// The instrument this gate validates.
    #[must_use]
    #[inline]
    pub fn instrument(&self) -> InstrumentId {
        self.instrument
    }

    /// The sequence number the next admissible event must carry.
    #[must_use]
    #[inline]
    pub fn expected_sequence(&self) -> u64 {
        self.expected
    }

    /// True while a detected gap blocks the feed.
    #[must_use]
    #[inline]
    pub fn is_gapped(&self) -> bool {
        self.gapped
    }

    /// Validates one event against the expected sequence and its own
    /// payload rules.
    ///
    /// The sequence check runs first and an exactly-next event consumes
    /// its slot even when the payload then fails validation. Rejecting a
    /// malformed event without consuming its sequence would make the next
    /// well-formed event look like a gap.
    ///
    /// # Errors
    ///
    /// - [`BookError::Stale`] while a previous gap is unresolved.
    /// - [`BookError::SequenceGap`] when the sequence jumps ahead; the gap
    ///   latches and the instrument needs a snapshot resync.
    /// - [`BookError::Validation`] for malformed payloads.
    pub fn accept(&mut self, event: OrderEvent) -> Result<IngestOutcome, BookError> {
        if event.instrument != self.instrument {
            return Err(BookError::validation(format!(
                "event for instrument {} reached gate for instrument {}",
                event.instrument, self.instrument
            )));
        }
        if self.gapped {
            return Err(BookError::Stale {
                instrument: self.instrument,
            });
        }
        if event.sequence < self.expected {
            warn!(
                "ingestor {}: duplicate delivery of sequence {}, expecting {}",
                self.instrument, event.sequence, self.expected
            );
            return Ok(IngestOutcome::Duplicate {
                sequence: event.sequence,
            });
        }
        if event.sequence > self.expected {
            self.gapped = true;
            error!(
                "ingestor {}: sequence gap, expected {} got {}, instrument needs resync",
                self.instrument, self.expected, event.sequence
            );
            return Err(BookError::SequenceGap {
                instrument: self.instrument,
                expected: self.expected,
                got: event.sequence,
            });
        }

        self.expected += 1;
        Self::validate_payload(&event)?;
        Ok(IngestOutcome::Forward(event))
    }

    /// Re-anchors the gate after a snapshot restore.
    ///
    /// `last_sequence` is the snapshot's last applied sequence; the next
    /// admissible event is the one after it.
    pub fn resync(&mut self, last_sequence: u64) {
        self.expected = last_sequence + 1;
        self.gapped = false;
        info!(
            "ingestor {}: resynced, expecting sequence {}",
            self.instrument, self.expected
        );
    }

    fn validate_payload(event: &OrderEvent) -> Result<(), BookError> {
        match event.kind {
            EventKind::Add {
                price,
                quantity,
                time_in_force,
                ..
            } => {
                if quantity == 0 {
                    return Err(BookError::validation("add with zero quantity"));
                }
                match time_in_force {
                    TimeInForce::Market if price != 0 => Err(BookError::validation(
                        "market order carries a limit price",
                    )),
                    TimeInForce::Market => Ok(()),
                    _ if price == 0 => Err(BookError::validation("add with zero price")),
                    _ => Ok(()),
                }
            }
            EventKind::Modify {
                new_price,
                new_quantity,
                ..
            } => {
                if new_price == 0 {
                    return Err(BookError::validation("modify with zero price"));
                }
                if new_quantity == 0 {
                    return Err(BookError::validation(
                        "modify with zero quantity; cancel is the removal path",
                    ));
                }
                Ok(())
            }
            EventKind::Cancel { .. } => Ok(()),
            EventKind::Trade { quantity, .. } => {
                if quantity == 0 {
                    return Err(BookError::validation("trade with zero quantity"));
                }
                Ok(())
            }
        }
    }
}
