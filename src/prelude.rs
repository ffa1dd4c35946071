//! Prelude module that re-exports commonly used types.
//!
//! This module provides a convenient way to import the most commonly used
//! types from the bookbuilder-rs crate. Instead of importing each type
//! individually, you can use:
//!
//! ```rust
//! use bookbuilder_rs::prelude::*;
//! ```
//!
//! This will import all the essential types needed for building and
//! consuming order books.

// Core book types
pub use crate::engine::book::{ApplyOutcome, Book, LevelChange};
pub use crate::engine::error::BookError;
pub use crate::engine::level::PriceLevel;
pub use crate::engine::order::{Order, OrderStatus};

// Identifier, side, and event types
pub use crate::engine::types::{
    EventKind, InstrumentId, OrderEvent, OrderId, Side, TimeInForce,
};

// Ingest pipeline
pub use crate::engine::config::EngineConfig;
pub use crate::engine::context::{ContextStats, InstrumentContext};
pub use crate::engine::ingestor::{IngestOutcome, Ingestor};

// Outbound feed types
pub use crate::engine::publisher::{Delta, FeedFlags, FeedMessage, Publisher, Subscription};

// Depth query views
pub use crate::engine::depth::{DepthView, LevelView};

// Snapshot types
pub use crate::engine::snapshot::{
    BookSnapshot, LevelSnapshot, OrderSnapshot, SnapshotError, SnapshotPackage,
};

// Multi-instrument engines
pub use crate::engine::registry::{Engine, EngineError, EngineStd};

// Trade-related types
pub use crate::engine::trade::{Trade, TradeListener};

// Utility functions
pub use crate::utils::{current_time_millis, current_time_nanos};
