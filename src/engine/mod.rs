//! Book building engine: sequenced ingest, per-instrument books, and delta publication.

pub mod book;
pub mod config;
/// Single-writer execution context tying gate, book, and publisher together.
pub mod context;
/// Aggregate per-level views for depth queries.
pub mod depth;
pub mod error;
/// Strict sequence validation in front of each book.
pub mod ingestor;
pub mod level;
pub mod order;
/// Bounded fan-out of deltas and trades to subscribers.
pub mod publisher;
/// Multi-instrument engines in async and blocking flavors.
pub mod registry;
pub mod snapshot;
pub mod trade;
pub mod types;

mod analytics;
mod matching;

pub use book::{ApplyOutcome, Book, LevelChange};
pub use config::EngineConfig;
pub use context::{ContextStats, InstrumentContext};
pub use depth::{DepthView, LevelView};
pub use error::BookError;
pub use ingestor::{IngestOutcome, Ingestor};
pub use level::PriceLevel;
pub use order::{Order, OrderStatus};
pub use publisher::{Delta, FeedFlags, FeedMessage, Publisher, Subscription};
pub use registry::{Engine, EngineError, EngineStd};
pub use snapshot::{
    BookSnapshot, LevelSnapshot, OrderSnapshot, SNAPSHOT_FORMAT_VERSION, SnapshotError,
    SnapshotPackage,
};
pub use trade::{Trade, TradeListener};
pub use types::{EventKind, InstrumentId, OrderEvent, OrderId, Side, TimeInForce};
