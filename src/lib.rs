//! # Book Builder Engine
//!
//! A limit order book construction engine written in Rust. This crate turns a
//! sequenced stream of canonical order events into live, queryable books for
//! many instruments at once, and republishes every change as incremental
//! deltas for downstream consumers. It is the book-building core of a trading
//! platform: feed handlers push events in, strategies and risk systems read
//! books and subscribe to changes.
//!
//! ## Key Features
//!
//! - **Strict Sequencing**: Every instrument's event stream is admitted
//!   exactly in sequence order. Duplicates are absorbed, and a detected gap
//!   freezes the instrument until a checksummed snapshot re-anchors it, so a
//!   book is either provably current or explicitly stale, never silently
//!   wrong.
//!
//! - **Price-Time Priority**: Books maintain full depth with FIFO order
//!   queues per price level. Crossing orders match against resting depth at
//!   the resting level's price, walking levels best-first and queues in
//!   arrival order.
//!
//! - **Single-Writer Concurrency**: Each instrument is owned by exactly one
//!   worker, so the hot path has no locks at all. Concurrency lives at the
//!   edges: a sharded registry for instrument lookup and bounded queues for
//!   subscriber fan-out.
//!
//! - **Non-Blocking Publication**: Subscribers receive level deltas and
//!   trades over bounded queues. A slow consumer never stalls the book; its
//!   overflow is dropped and flagged with a resync marker instead.
//!
//! - **Execution Constraints**: Incoming orders carry good-till-cancel,
//!   immediate-or-cancel, fill-or-kill, or market semantics, resolved
//!   entirely inside the matching path.
//!
//! - **Verifiable State**: Snapshots are versioned and SHA-256 checksummed,
//!   and every book can audit its own structural invariants on demand.
//!
//! ## Design Goals
//!
//! 1. **Correctness**: The book must mirror the venue exactly; when it
//!    cannot (lost events), it must say so rather than guess.
//! 2. **Determinism**: Replaying the same event stream always produces the
//!    same books and the same trades.
//! 3. **Latency**: The ingest path is one channel hop plus synchronous,
//!    allocation-light apply logic.
//! 4. **Isolation**: One instrument's load or failure never affects
//!    another's pipeline.
//!
//! ## Architecture
//!
//! Events flow through three stages per instrument, all owned by one
//! execution context:
//!
//! 1. **Ingestor**: validates that each event is exactly the next in
//!    sequence and well-formed, latching a gap otherwise.
//! 2. **Book**: applies adds, modifies, cancels, and venue trades, resolving
//!    any crossing internally with price-time priority.
//! 3. **Publisher**: turns the applied changes into per-level deltas and
//!    trade records, fanned out to subscribers over bounded queues.
//!
//! The [`Engine`](crate::engine::Engine) (Tokio tasks) and
//! [`EngineStd`](crate::engine::EngineStd) (OS threads) registries run one
//! context per instrument and route commands to them.
//!
//! ## Quick Start
//!
//! ```
//! use bookbuilder_rs::prelude::*;
//!
//! let config = EngineConfig::default();
//! let mut context = InstrumentContext::new(InstrumentId(1), &config);
//!
//! let event = OrderEvent {
//!     instrument: InstrumentId(1),
//!     sequence: 1,
//!     timestamp_ns: 0,
//!     kind: EventKind::Add {
//!         order_id: OrderId(10),
//!         venue_order_id: 9_001,
//!         side: Side::Bid,
//!         price: 100,
//!         quantity: 25,
//!         time_in_force: TimeInForce::Gtc,
//!     },
//! };
//!
//! context.process(event).expect("first event of the feed");
//! assert_eq!(context.book().best_bid(), Some((100, 25)));
//! ```
//!
//! ## Use Cases
//!
//! - **Trading Systems**: Book construction layer between feed handlers and
//!   strategy code
//! - **Market Simulation**: Deterministic replay of recorded event streams
//! - **Research**: Full-depth order flow reconstruction for microstructure
//!   studies

pub mod engine;
pub mod prelude;
mod utils;

pub use engine::book::{ApplyOutcome, Book, LevelChange};
pub use engine::config::EngineConfig;
pub use engine::context::{ContextStats, InstrumentContext};
pub use engine::depth::{DepthView, LevelView};
pub use engine::error::BookError;
pub use engine::ingestor::{IngestOutcome, Ingestor};
pub use engine::level::PriceLevel;
pub use engine::order::{Order, OrderStatus};
pub use engine::publisher::{Delta, FeedFlags, FeedMessage, Publisher, Subscription};
pub use engine::registry::{Engine, EngineError, EngineStd};
pub use engine::snapshot::{
    BookSnapshot, LevelSnapshot, OrderSnapshot, SNAPSHOT_FORMAT_VERSION, SnapshotError,
    SnapshotPackage,
};
pub use engine::trade::{Trade, TradeListener};
pub use engine::types::{EventKind, InstrumentId, OrderEvent, OrderId, Side, TimeInForce};
pub use utils::{current_time_millis, current_time_nanos};
