//! Engine tuning knobs.

use serde::{Deserialize, Serialize};

/// Capacities and limits for an engine and its execution contexts.
///
/// The defaults suit a mid-size instrument universe; loaders typically
/// deserialize this from a JSON config file and override per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bound of each instrument's inbound event queue. Submission blocks
    /// (async) once the context falls this far behind.
    pub event_queue_capacity: usize,

    /// Bound of each subscriber's outbound queue. Overflow drops the
    /// message and flags the subscriber for resync.
    pub subscriber_queue_capacity: usize,

    /// Deepest per-side view a depth query may request.
    pub max_query_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: 4096,
            subscriber_queue_capacity: 1024,
            max_query_depth: 64,
        }
    }
}

impl EngineConfig {
    /// Replaces the inbound event queue bound.
    #[must_use]
    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity.max(1);
        self
    }

    /// Replaces the subscriber queue bound.
    #[must_use]
    pub fn with_subscriber_queue_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_queue_capacity = capacity.max(1);
        self
    }

    /// Replaces the depth query limit.
    #[must_use]
    pub fn with_max_query_depth(mut self, depth: usize) -> Self {
        self.max_query_depth = depth.max(1);
        self
    }

    /// Resolves a requested depth against the configured limit. Zero asks
    /// for the maximum allowed.
    #[must_use]
    pub fn clamp_depth(&self, requested: usize) -> usize {
        if requested == 0 {
            self.max_query_depth
        } else {
            requested.min(self.max_query_depth)
        }
    }
}
