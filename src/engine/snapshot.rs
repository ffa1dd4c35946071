//! Full book snapshots and the checksummed package that carries them.
//!
//! Snapshots are the engine's only recovery primitive: a gapped instrument
//! rebuilds its book wholesale from one, and a subscriber that fell behind
//! pulls one to resynchronize. The [`SnapshotPackage`] wrapper adds a
//! format version and a SHA-256 checksum over the canonical JSON of the
//! payload, so snapshots handed across process boundaries can be verified
//! before they are trusted.

use crate::engine::book::Book;
use crate::engine::level::PriceLevel;
use crate::engine::order::{Order, OrderStatus};
use crate::engine::types::{InstrumentId, OrderId, Side};
use crate::utils::current_time_nanos;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

/// Format version for checksummed snapshot packages.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Errors raised while packaging, validating, or restoring snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot payload could not be serialized to canonical JSON.
    #[error("failed to encode snapshot: {source}")]
    Encode {
        /// Underlying serializer error.
        source: serde_json::Error,
    },

    /// The package could not be parsed back from JSON.
    #[error("failed to decode snapshot package: {source}")]
    Decode {
        /// Underlying deserializer error.
        source: serde_json::Error,
    },

    /// The package was produced by an incompatible format version.
    #[error("unsupported snapshot version {found}, expected {expected}")]
    UnsupportedVersion {
        /// Version found in the package.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },

    /// The stored checksum does not match the payload.
    #[error("snapshot checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch {
        /// Checksum carried by the package.
        stored: String,
        /// Checksum recomputed from the payload.
        computed: String,
    },

    /// The snapshot belongs to a different instrument than the book.
    #[error("snapshot for instrument {snapshot} cannot restore book for instrument {book}")]
    InstrumentMismatch {
        /// Instrument in the snapshot.
        snapshot: InstrumentId,
        /// Instrument of the target book.
        book: InstrumentId,
    },

    /// The restored book failed its structural audit.
    #[error("restored book failed integrity audit: {reason}")]
    Integrity {
        /// First violated invariant.
        reason: String,
    },
}

/// One resting order inside a snapshot, in queue position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    /// Canonical order identifier.
    pub order_id: OrderId,
    /// Identifier assigned by the venue.
    pub venue_order_id: u64,
    /// Remaining open quantity.
    pub quantity: u64,
    /// Arrival sequence establishing the queue position.
    pub sequence: u64,
    /// Lifecycle state at capture time.
    pub status: OrderStatus,
}

/// One price level inside a snapshot, orders in queue order (head first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    /// Level price in ticks.
    pub price: u64,
    /// Aggregate remaining quantity at the level.
    pub aggregate_quantity: u64,
    /// Member orders, earliest arrival first.
    pub orders: Vec<OrderSnapshot>,
}

/// A full point-in-time capture of one instrument's book.
///
/// Levels are stored best price first on both sides, with each level's
/// queue in arrival order, so restoring reproduces price-time priority
/// exactly. `last_sequence` anchors the snapshot in the instrument's event
/// stream: resynchronization resumes expecting `last_sequence + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    /// The instrument the snapshot captures.
    pub instrument: InstrumentId,
    /// Sequence of the last event applied before capture.
    pub last_sequence: u64,
    /// Wall-clock capture time, nanoseconds since the Unix epoch.
    pub timestamp_ns: u64,
    /// Bid levels, highest price first.
    pub bids: Vec<LevelSnapshot>,
    /// Ask levels, lowest price first.
    pub asks: Vec<LevelSnapshot>,
}

impl BookSnapshot {
    /// Recomputes every level's aggregate from its member orders.
    ///
    /// Run before checksumming so the checksum covers self-consistent
    /// data even if the producer filled aggregates by hand.
    pub fn refresh_aggregates(&mut self) {
        for level in self.bids.iter_mut().chain(self.asks.iter_mut()) {
            level.aggregate_quantity = level.orders.iter().map(|o| o.quantity).sum();
        }
    }

    /// Best bid as (price, aggregate quantity).
    #[must_use]
    pub fn best_bid(&self) -> Option<(u64, u64)> {
        self.bids
            .first()
            .map(|level| (level.price, level.aggregate_quantity))
    }

    /// Best ask as (price, aggregate quantity).
    #[must_use]
    pub fn best_ask(&self) -> Option<(u64, u64)> {
        self.asks
            .first()
            .map(|level| (level.price, level.aggregate_quantity))
    }

    /// Total number of orders on both sides.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.bids
            .iter()
            .chain(self.asks.iter())
            .map(|level| level.orders.len())
            .sum()
    }
}

/// Checksummed, versioned wrapper around a [`BookSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPackage {
    /// Snapshot format version.
    pub version: u32,
    /// The snapshot payload.
    pub snapshot: BookSnapshot,
    /// Hex-encoded SHA-256 of the payload's canonical JSON.
    pub checksum: String,
}

impl SnapshotPackage {
    /// Packages a snapshot, refreshing aggregates and computing the
    /// checksum over the result.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Encode`] if the payload cannot be
    /// serialized for checksumming.
    pub fn new(mut snapshot: BookSnapshot) -> Result<Self, SnapshotError> {
        snapshot.refresh_aggregates();
        let checksum = Self::compute_checksum(&snapshot)?;
        Ok(Self {
            version: SNAPSHOT_FORMAT_VERSION,
            snapshot,
            checksum,
        })
    }

    /// Serializes the package to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Encode`] on serializer failure.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(|source| SnapshotError::Encode { source })
    }

    /// Parses a package from JSON. The checksum is not verified here;
    /// call [`validate`](Self::validate) or
    /// [`into_snapshot`](Self::into_snapshot) before trusting the payload.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Decode`] on parse failure.
    pub fn from_json(data: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(data).map_err(|source| SnapshotError::Decode { source })
    }

    /// Verifies the format version and checksum.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::UnsupportedVersion`] or
    /// [`SnapshotError::ChecksumMismatch`] accordingly.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }
        let computed = Self::compute_checksum(&self.snapshot)?;
        if computed != self.checksum {
            return Err(SnapshotError::ChecksumMismatch {
                stored: self.checksum.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// Validates the package and returns the payload.
    ///
    /// # Errors
    ///
    /// Propagates the failures of [`validate`](Self::validate).
    pub fn into_snapshot(self) -> Result<BookSnapshot, SnapshotError> {
        self.validate()?;
        Ok(self.snapshot)
    }

    fn compute_checksum(snapshot: &BookSnapshot) -> Result<String, SnapshotError> {
        let payload =
            serde_json::to_vec(snapshot).map_err(|source| SnapshotError::Encode { source })?;
        let mut hasher = Sha256::new();
        hasher.update(payload);
        let digest = hasher.finalize();
        Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
    }
}

impl Book {
    /// Captures the full current state: every level on both sides in
    /// best-first order, each queue in arrival order.
    #[must_use]
    pub fn snapshot(&self) -> BookSnapshot {
        let capture_side = |side: Side| -> Vec<LevelSnapshot> {
            self.side(side)
                .iter()
                .map(|(price, level)| self.capture_level(*price, level))
                .collect()
        };
        let mut bids = capture_side(Side::Bid);
        // Bid levels are stored ascending; snapshots present best first.
        bids.reverse();
        let asks = capture_side(Side::Ask);
        BookSnapshot {
            instrument: self.instrument,
            last_sequence: self.last_sequence,
            timestamp_ns: current_time_nanos(),
            bids,
            asks,
        }
    }

    fn capture_level(&self, price: u64, level: &PriceLevel) -> LevelSnapshot {
        LevelSnapshot {
            price,
            aggregate_quantity: level.aggregate_quantity(),
            orders: level
                .order_ids()
                .filter_map(|order_id| self.orders.get(&order_id))
                .map(|order| OrderSnapshot {
                    order_id: order.id,
                    venue_order_id: order.venue_order_id,
                    quantity: order.quantity,
                    sequence: order.sequence,
                    status: order.status,
                })
                .collect(),
        }
    }

    /// Rebuilds the book wholesale from a snapshot.
    ///
    /// The snapshot is first rebuilt into a staging book and audited
    /// there; only a structurally valid result replaces both sides, the
    /// arena, and the applied sequence, and clears the stale flag.
    /// A failed restore leaves the book exactly as it was, stale flag
    /// included. Applying the same snapshot any number of times yields
    /// the same valid state.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::InstrumentMismatch`] if the snapshot belongs to a
    /// different instrument, [`SnapshotError::Integrity`] if the rebuilt
    /// book violates a structural invariant (duplicate order ids, crossed
    /// sides).
    pub fn restore(&mut self, snapshot: &BookSnapshot) -> Result<(), SnapshotError> {
        if snapshot.instrument != self.instrument {
            return Err(SnapshotError::InstrumentMismatch {
                snapshot: snapshot.instrument,
                book: self.instrument,
            });
        }
        let mut staged = Book::new(self.instrument);

        for (side, levels) in [(Side::Bid, &snapshot.bids), (Side::Ask, &snapshot.asks)] {
            for level_snapshot in levels {
                let mut level = PriceLevel::new(level_snapshot.price);
                for order_snapshot in &level_snapshot.orders {
                    if order_snapshot.quantity == 0 {
                        warn!(
                            "book {}: snapshot carries zero-quantity order {}, skipped",
                            self.instrument, order_snapshot.order_id
                        );
                        continue;
                    }
                    level.push_back(order_snapshot.order_id, order_snapshot.quantity);
                    staged.orders.insert(
                        order_snapshot.order_id,
                        Order {
                            id: order_snapshot.order_id,
                            side,
                            price: level_snapshot.price,
                            quantity: order_snapshot.quantity,
                            sequence: order_snapshot.sequence,
                            venue_order_id: order_snapshot.venue_order_id,
                            status: order_snapshot.status,
                        },
                    );
                }
                if !level.is_empty() {
                    staged.side_mut(side).insert(level_snapshot.price, level);
                }
            }
        }

        staged.audit().map_err(|err| SnapshotError::Integrity {
            reason: err.to_string(),
        })?;

        self.bids = staged.bids;
        self.asks = staged.asks;
        self.orders = staged.orders;
        self.last_sequence = snapshot.last_sequence;
        self.stale = false;
        info!(
            "book {}: restored from snapshot at sequence {}, {} orders over {} bid / {} ask levels",
            self.instrument,
            self.last_sequence,
            self.orders.len(),
            self.bids.len(),
            self.asks.len()
        );
        Ok(())
    }
}
