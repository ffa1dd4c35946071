//! Outbound fan-out of level deltas and trades to subscribers.
//!
//! The publisher runs on the instrument's execution context, directly after
//! each event is applied. Subscribers receive messages over bounded queues
//! and are never allowed to block the book: when a subscriber's queue is
//! full the message is dropped, the subscriber is flagged, and the next
//! message it would receive is a [`FeedMessage::ResyncRequired`] marker
//! telling it to pull a fresh snapshot before trusting further deltas.
//!
//! Deltas carry their own publish sequence, a per-instrument counter that
//! advances once per published delta. It is unrelated to the ingest
//! sequence of the event stream; subscribers use it to detect holes in
//! their own feed, not to reason about the venue's.

use crate::engine::book::ApplyOutcome;
use crate::engine::trade::Trade;
use crate::engine::types::{InstrumentId, Side};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};
use uuid::Uuid;

bitflags! {
    /// Selects which message classes a subscription receives.
    ///
    /// Flags combine with bitwise OR. A depth-mirroring consumer wants
    /// `LEVEL_DELTAS`; a tape consumer wants `TRADES`; `ALL` takes both.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct FeedFlags: u32 {
        /// Per-level aggregate changes.
        const LEVEL_DELTAS = 1 << 0;

        /// Execution records.
        const TRADES = 1 << 1;

        /// Every message class.
        const ALL = Self::LEVEL_DELTAS.bits() | Self::TRADES.bits();
    }
}

/// An incremental change to one price level.
///
/// A delta replaces the level's previous aggregate outright; consumers
/// apply it with no arithmetic. `level_removed` marks the level's
/// disappearance, in which case `aggregate_quantity` is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// The instrument whose book changed.
    pub instrument: InstrumentId,
    /// Side of the changed level.
    pub side: Side,
    /// Price of the changed level in ticks.
    pub price: u64,
    /// New aggregate remaining quantity at the level.
    pub aggregate_quantity: u64,
    /// True when the level emptied and left the book.
    pub level_removed: bool,
    /// Position of this delta in the instrument's publish stream.
    pub publish_sequence: u64,
}

/// A message delivered to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedMessage {
    /// One price level changed.
    Delta(Delta),
    /// An execution happened.
    Trade(Trade),
    /// Messages were dropped for this subscriber. Everything received
    /// before this marker is still valid; everything after it is only
    /// meaningful relative to a freshly pulled snapshot.
    ResyncRequired {
        /// The instrument whose feed has a hole.
        instrument: InstrumentId,
    },
}

/// A subscriber's receiving end of the feed. Dropping it detaches the
/// subscription; the publisher notices on its next delivery attempt.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::Receiver<FeedMessage>,
}

impl Subscription {
    /// Identifier assigned to this subscription.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the next message. Returns `None` once the publisher side
    /// is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<FeedMessage> {
        self.receiver.recv().await
    }

    /// Takes the next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<FeedMessage> {
        self.receiver.try_recv().ok()
    }

    /// Blocking receive for synchronous consumers.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous runtime; use
    /// [`recv`](Self::recv) there instead.
    pub fn blocking_recv(&mut self) -> Option<FeedMessage> {
        self.receiver.blocking_recv()
    }
}

struct SubscriberSlot {
    id: Uuid,
    flags: FeedFlags,
    sender: mpsc::Sender<FeedMessage>,
    /// A message was dropped; a resync marker must precede any further
    /// delivery to this subscriber.
    needs_resync: bool,
    live: bool,
}

/// Per-instrument publisher owning the subscriber list.
pub struct Publisher {
    instrument: InstrumentId,
    publish_sequence: u64,
    queue_capacity: usize,
    subscribers: Vec<SubscriberSlot>,
    dropped: u64,
}

impl Publisher {
    /// Creates a publisher whose subscriptions buffer up to
    /// `queue_capacity` messages.
    #[must_use]
    pub fn new(instrument: InstrumentId, queue_capacity: usize) -> Self {
        Self {
            instrument,
            publish_sequence: 0,
            queue_capacity: queue_capacity.max(1),
            subscribers: Vec::new(),
            dropped: 0,
        }
    }

    /// The instrument this publisher serves.
    #[must_use]
    #[inline]
    pub fn instrument(&self) -> InstrumentId {
        self.instrument
    }

    /// Sequence number of the most recently published delta.
    #[must_use]
    #[inline]
    pub fn publish_sequence(&self) -> u64 {
        self.publish_sequence
    }

    /// Number of attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Total messages dropped across all subscribers since creation.
    #[must_use]
    #[inline]
    pub fn drop_count(&self) -> u64 {
        self.dropped
    }

    /// Attaches a new subscriber interested in `flags`.
    pub fn subscribe(&mut self, flags: FeedFlags) -> Subscription {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        self.subscribers.push(SubscriberSlot {
            id,
            flags,
            sender,
            needs_resync: false,
            live: true,
        });
        info!(
            "publisher {}: subscriber {id} attached with flags {flags:?}",
            self.instrument
        );
        Subscription { id, receiver }
    }

    /// Publishes everything one applied event produced: a delta per level
    /// change, then the trades.
    ///
    /// Each delta advances the publish sequence whether or not anyone is
    /// subscribed, so the stream's numbering does not depend on observer
    /// lifecycle.
    pub fn publish(&mut self, outcome: &ApplyOutcome) {
        for change in &outcome.changes {
            self.publish_sequence += 1;
            let delta = Delta {
                instrument: self.instrument,
                side: change.side,
                price: change.price,
                aggregate_quantity: change.aggregate_quantity,
                level_removed: change.level_removed,
                publish_sequence: self.publish_sequence,
            };
            self.fan_out(FeedMessage::Delta(delta), FeedFlags::LEVEL_DELTAS);
        }
        for trade in &outcome.trades {
            self.fan_out(FeedMessage::Trade(*trade), FeedFlags::TRADES);
        }
        self.prune();
    }

    /// Flags every subscriber for resync and pushes the markers out
    /// immediately where queue space allows.
    ///
    /// Called when the instrument itself lost events (sequence gap): every
    /// downstream consumer must re-anchor on a snapshot, exactly as if its
    /// own queue had overflowed.
    pub fn broadcast_resync(&mut self) {
        warn!(
            "publisher {}: broadcasting resync to {} subscribers",
            self.instrument,
            self.subscribers.len()
        );
        for slot in &mut self.subscribers {
            if slot.live {
                slot.needs_resync = true;
            }
        }
        self.flush_resync_markers();
        self.prune();
    }

    fn fan_out(&mut self, message: FeedMessage, interest: FeedFlags) {
        let instrument = self.instrument;
        for slot in &mut self.subscribers {
            if !slot.live || !slot.flags.intersects(interest) {
                continue;
            }
            if slot.needs_resync {
                match slot.sender.try_send(FeedMessage::ResyncRequired { instrument }) {
                    Ok(()) => slot.needs_resync = false,
                    Err(TrySendError::Full(_)) => {
                        // Marker still pending; this message is part of the
                        // hole the marker announces.
                        self.dropped += 1;
                        continue;
                    }
                    Err(TrySendError::Closed(_)) => {
                        slot.live = false;
                        continue;
                    }
                }
            }
            match slot.sender.try_send(message) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    slot.needs_resync = true;
                    self.dropped += 1;
                    warn!(
                        "publisher {instrument}: subscriber {} queue full, message dropped, resync flagged",
                        slot.id
                    );
                }
                Err(TrySendError::Closed(_)) => slot.live = false,
            }
        }
    }

    fn flush_resync_markers(&mut self) {
        let instrument = self.instrument;
        for slot in &mut self.subscribers {
            if !slot.live || !slot.needs_resync {
                continue;
            }
            match slot.sender.try_send(FeedMessage::ResyncRequired { instrument }) {
                Ok(()) => slot.needs_resync = false,
                // A full queue keeps the marker pending; it goes out ahead
                // of the next delivery instead.
                Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => slot.live = false,
            }
        }
    }

    fn prune(&mut self) {
        let instrument = self.instrument;
        self.subscribers.retain(|slot| {
            if !slot.live {
                info!("publisher {instrument}: subscriber {} detached", slot.id);
            }
            slot.live
        });
    }
}
