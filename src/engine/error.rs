//! Engine error types

use crate::engine::types::{InstrumentId, OrderId};
use std::fmt;

/// Errors raised while ingesting or applying canonical events.
///
/// The variants split into three severities. `Validation` and
/// `UnknownOrder` are local: the offending event is rejected or ignored,
/// the book is left untouched, and processing continues. `SequenceGap` is
/// fatal to the instrument's in-memory state: the book is stale from that
/// point and refuses every event (reported as `Stale`) until a fresh
/// snapshot is installed. Nothing here is retried internally.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BookError {
    /// Malformed event rejected at the boundary. The book is not mutated.
    Validation {
        /// Description of the failed check.
        reason: String,
    },

    /// A sequence number arrived ahead of the expected one, so at least one
    /// event was lost. The instrument's book must be rebuilt from a
    /// snapshot before any further event is applied.
    SequenceGap {
        /// The instrument whose feed gapped.
        instrument: InstrumentId,
        /// The sequence number that was expected next.
        expected: u64,
        /// The sequence number that actually arrived.
        got: u64,
    },

    /// Cancel/Modify/Trade referenced an order the book does not hold.
    /// Non-fatal: logged as a possible desynchronization signal and
    /// otherwise ignored.
    UnknownOrder {
        /// The identifier that could not be resolved.
        order_id: OrderId,
    },

    /// An event reached a book already marked stale by a sequence gap.
    Stale {
        /// The instrument whose book is awaiting resynchronization.
        instrument: InstrumentId,
    },
}

impl fmt::Display for BookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookError::Validation { reason } => write!(f, "validation failed: {reason}"),
            BookError::SequenceGap {
                instrument,
                expected,
                got,
            } => {
                write!(
                    f,
                    "sequence gap on instrument {instrument}: expected {expected}, got {got}"
                )
            }
            BookError::UnknownOrder { order_id } => {
                write!(f, "unknown order: {order_id}")
            }
            BookError::Stale { instrument } => {
                write!(
                    f,
                    "book for instrument {instrument} is stale pending snapshot resync"
                )
            }
        }
    }
}

impl std::error::Error for BookError {}

impl BookError {
    /// Convenience constructor for validation failures.
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        BookError::Validation {
            reason: reason.into(),
        }
    }

    /// True for errors that leave the instrument processable: the caller
    /// logs and moves on. `SequenceGap` and `Stale` return false since the
    /// instrument needs a snapshot before anything else can be applied.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BookError::Validation { .. } | BookError::UnknownOrder { .. }
        )
    }
}
