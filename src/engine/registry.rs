//! Multi-instrument engines in async and blocking flavors.
//!
//! Each registered instrument gets a dedicated worker owning its
//! [`InstrumentContext`]; the engine holds only a command sender per
//! instrument. All mutation flows through the worker's queue, which is what
//! makes the per-instrument pipeline single-writer: the book itself never
//! needs a lock. [`Engine`] spawns Tokio tasks and suits async services;
//! [`EngineStd`] spawns OS threads over crossbeam channels for synchronous
//! embedders. Both speak the same command set and share the worker logic.

use crate::engine::config::EngineConfig;
use crate::engine::context::{ContextStats, InstrumentContext};
use crate::engine::depth::DepthView;
use crate::engine::error::BookError;
use crate::engine::publisher::{FeedFlags, Subscription};
use crate::engine::snapshot::{SnapshotError, SnapshotPackage};
use crate::engine::trade::TradeListener;
use crate::engine::types::{InstrumentId, OrderEvent};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, trace};

/// Errors surfaced at the engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The instrument has no registered context.
    #[error("instrument {0} is not registered")]
    UnknownInstrument(InstrumentId),

    /// The instrument already has a context.
    #[error("instrument {0} is already registered")]
    AlreadyRegistered(InstrumentId),

    /// The instrument's worker is gone; its queue is closed.
    #[error("execution context for instrument {0} has stopped")]
    ContextStopped(InstrumentId),

    /// An error from the instrument's book pipeline.
    #[error(transparent)]
    Book(#[from] BookError),

    /// An error from snapshot packaging or restore.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Commands a worker accepts over its queue.
///
/// Queries carry a oneshot reply; the event path does not, keeping the hot
/// path a single channel hop.
enum EngineCommand {
    Event(OrderEvent),
    Subscribe {
        flags: FeedFlags,
        reply: oneshot::Sender<Subscription>,
    },
    Snapshot {
        reply: oneshot::Sender<Result<SnapshotPackage, SnapshotError>>,
    },
    InstallSnapshot {
        package: SnapshotPackage,
        reply: oneshot::Sender<Result<(), SnapshotError>>,
    },
    Depth {
        depth: usize,
        reply: oneshot::Sender<DepthView>,
    },
    Stats {
        reply: oneshot::Sender<ContextStats>,
    },
    Shutdown,
}

/// Runs one command against the context. Returns `false` on shutdown.
fn handle_command(context: &mut InstrumentContext, command: EngineCommand) -> bool {
    match command {
        EngineCommand::Event(event) => {
            if let Err(err) = context.process(event) {
                // Counted in stats and logged where detected; the worker
                // keeps draining its queue.
                trace!("context {}: event rejected: {err}", context.instrument());
            }
            true
        }
        EngineCommand::Subscribe { flags, reply } => {
            let _ = reply.send(context.subscribe(flags));
            true
        }
        EngineCommand::Snapshot { reply } => {
            let _ = reply.send(context.snapshot_package());
            true
        }
        EngineCommand::InstallSnapshot { package, reply } => {
            let _ = reply.send(context.install_snapshot(package));
            true
        }
        EngineCommand::Depth { depth, reply } => {
            let _ = reply.send(context.depth(depth));
            true
        }
        EngineCommand::Stats { reply } => {
            let _ = reply.send(context.stats());
            true
        }
        EngineCommand::Shutdown => false,
    }
}

async fn run_context(mut context: InstrumentContext, mut commands: mpsc::Receiver<EngineCommand>) {
    let instrument = context.instrument();
    info!("context {instrument}: worker started");
    while let Some(command) = commands.recv().await {
        if !handle_command(&mut context, command) {
            break;
        }
    }
    info!("context {instrument}: worker stopped");
}

fn run_context_blocking(
    mut context: InstrumentContext,
    commands: crossbeam::channel::Receiver<EngineCommand>,
) {
    let instrument = context.instrument();
    info!("context {instrument}: worker started");
    while let Ok(command) = commands.recv() {
        if !handle_command(&mut context, command) {
            break;
        }
    }
    info!("context {instrument}: worker stopped");
}

struct InstrumentHandle {
    commands: mpsc::Sender<EngineCommand>,
    worker: tokio::task::JoinHandle<()>,
}

/// Async multi-instrument engine.
///
/// Registration spawns a Tokio task per instrument; submission and queries
/// are async sends into that task's bounded queue. The engine itself is
/// shared freely (`&self` everywhere), with the instrument registry held
/// in a [`DashMap`] so registrations and lookups never serialize against
/// each other.
pub struct Engine {
    config: EngineConfig,
    contexts: DashMap<InstrumentId, InstrumentHandle>,
}

impl Engine {
    /// Creates an engine with the given tuning.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            contexts: DashMap::new(),
        }
    }

    /// The tuning this engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers an instrument and starts its worker.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyRegistered`] if a context exists.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime; the worker is spawned
    /// onto the current one.
    pub fn register(&self, instrument: InstrumentId) -> Result<(), EngineError> {
        self.register_inner(instrument, None)
    }

    /// Registers an instrument whose book notifies `listener` of trades.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyRegistered`] if a context exists.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn register_with_listener(
        &self,
        instrument: InstrumentId,
        listener: TradeListener,
    ) -> Result<(), EngineError> {
        self.register_inner(instrument, Some(listener))
    }

    fn register_inner(
        &self,
        instrument: InstrumentId,
        listener: Option<TradeListener>,
    ) -> Result<(), EngineError> {
        match self.contexts.entry(instrument) {
            Entry::Occupied(_) => Err(EngineError::AlreadyRegistered(instrument)),
            Entry::Vacant(slot) => {
                let context = match listener {
                    Some(listener) => {
                        InstrumentContext::with_trade_listener(instrument, &self.config, listener)
                    }
                    None => InstrumentContext::new(instrument, &self.config),
                };
                let (sender, receiver) = mpsc::channel(self.config.event_queue_capacity);
                let worker = tokio::spawn(run_context(context, receiver));
                slot.insert(InstrumentHandle {
                    commands: sender,
                    worker,
                });
                info!("engine: registered instrument {instrument}");
                Ok(())
            }
        }
    }

    /// True when the instrument has a running context.
    #[must_use]
    pub fn is_registered(&self, instrument: InstrumentId) -> bool {
        self.contexts.contains_key(&instrument)
    }

    /// Identifiers of every registered instrument, in no particular order.
    #[must_use]
    pub fn instruments(&self) -> Vec<InstrumentId> {
        self.contexts.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of registered instruments.
    #[must_use]
    pub fn instrument_count(&self) -> usize {
        self.contexts.len()
    }

    // The sender is cloned out so no registry shard stays locked across an
    // await point.
    fn command_sender(
        &self,
        instrument: InstrumentId,
    ) -> Result<mpsc::Sender<EngineCommand>, EngineError> {
        self.contexts
            .get(&instrument)
            .map(|handle| handle.commands.clone())
            .ok_or(EngineError::UnknownInstrument(instrument))
    }

    async fn request<R>(
        &self,
        instrument: InstrumentId,
        command: EngineCommand,
        reply: oneshot::Receiver<R>,
    ) -> Result<R, EngineError> {
        let sender = self.command_sender(instrument)?;
        sender
            .send(command)
            .await
            .map_err(|_| EngineError::ContextStopped(instrument))?;
        reply
            .await
            .map_err(|_| EngineError::ContextStopped(instrument))
    }

    /// Queues one event for the instrument's worker.
    ///
    /// Waits only when the worker's queue is full. Per-event failures
    /// (validation, gaps) surface through stats, logs, and the feed's
    /// resync markers rather than through this call.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstrument`] or [`EngineError::ContextStopped`].
    pub async fn submit(&self, event: OrderEvent) -> Result<(), EngineError> {
        let sender = self.command_sender(event.instrument)?;
        sender
            .send(EngineCommand::Event(event))
            .await
            .map_err(|_| EngineError::ContextStopped(event.instrument))
    }

    /// Attaches a subscriber to the instrument's outbound feed.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstrument`] or [`EngineError::ContextStopped`].
    pub async fn subscribe(
        &self,
        instrument: InstrumentId,
        flags: FeedFlags,
    ) -> Result<Subscription, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.request(instrument, EngineCommand::Subscribe { flags, reply: tx }, rx)
            .await
    }

    /// Captures a checksummed snapshot of the instrument's book.
    ///
    /// # Errors
    ///
    /// Registry errors, or [`EngineError::Snapshot`] from packaging.
    pub async fn snapshot(
        &self,
        instrument: InstrumentId,
    ) -> Result<SnapshotPackage, EngineError> {
        let (tx, rx) = oneshot::channel();
        let package = self
            .request(instrument, EngineCommand::Snapshot { reply: tx }, rx)
            .await?;
        Ok(package?)
    }

    /// Installs a snapshot into the instrument's context, clearing a stale
    /// book and re-anchoring its sequence gate.
    ///
    /// # Errors
    ///
    /// Registry errors, or [`EngineError::Snapshot`] from validation or
    /// restore.
    pub async fn install_snapshot(
        &self,
        instrument: InstrumentId,
        package: SnapshotPackage,
    ) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        let result = self
            .request(
                instrument,
                EngineCommand::InstallSnapshot { package, reply: tx },
                rx,
            )
            .await?;
        result?;
        Ok(())
    }

    /// Per-side aggregate view of the instrument's top levels. The depth
    /// is clamped to the configured maximum; zero requests the maximum.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstrument`] or [`EngineError::ContextStopped`].
    pub async fn depth(
        &self,
        instrument: InstrumentId,
        depth: usize,
    ) -> Result<DepthView, EngineError> {
        let depth = self.config.clamp_depth(depth);
        let (tx, rx) = oneshot::channel();
        self.request(instrument, EngineCommand::Depth { depth, reply: tx }, rx)
            .await
    }

    /// The instrument context's counters.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstrument`] or [`EngineError::ContextStopped`].
    pub async fn stats(&self, instrument: InstrumentId) -> Result<ContextStats, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.request(instrument, EngineCommand::Stats { reply: tx }, rx)
            .await
    }

    /// Stops every worker and waits for them to drain.
    pub async fn shutdown(self) {
        for (instrument, handle) in self.contexts.into_iter() {
            let _ = handle.commands.send(EngineCommand::Shutdown).await;
            if let Err(err) = handle.worker.await {
                error!("engine: worker for instrument {instrument} panicked: {err}");
            }
        }
        info!("engine: shut down");
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

struct StdInstrumentHandle {
    commands: crossbeam::channel::Sender<EngineCommand>,
    worker: std::thread::JoinHandle<()>,
}

/// Blocking multi-instrument engine.
///
/// Same command set as [`Engine`] over OS threads and crossbeam channels.
/// Submission blocks while the worker's queue is full, which gives
/// synchronous feed handlers natural backpressure.
///
/// Queries block on their reply and must not be driven from inside an
/// async runtime; use [`Engine`] there.
pub struct EngineStd {
    config: EngineConfig,
    contexts: DashMap<InstrumentId, StdInstrumentHandle>,
}

impl EngineStd {
    /// Creates an engine with the given tuning.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            contexts: DashMap::new(),
        }
    }

    /// The tuning this engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers an instrument and starts its worker thread.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyRegistered`] if a context exists.
    pub fn register(&self, instrument: InstrumentId) -> Result<(), EngineError> {
        self.register_inner(instrument, None)
    }

    /// Registers an instrument whose book notifies `listener` of trades.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyRegistered`] if a context exists.
    pub fn register_with_listener(
        &self,
        instrument: InstrumentId,
        listener: TradeListener,
    ) -> Result<(), EngineError> {
        self.register_inner(instrument, Some(listener))
    }

    fn register_inner(
        &self,
        instrument: InstrumentId,
        listener: Option<TradeListener>,
    ) -> Result<(), EngineError> {
        match self.contexts.entry(instrument) {
            Entry::Occupied(_) => Err(EngineError::AlreadyRegistered(instrument)),
            Entry::Vacant(slot) => {
                let context = match listener {
                    Some(listener) => {
                        InstrumentContext::with_trade_listener(instrument, &self.config, listener)
                    }
                    None => InstrumentContext::new(instrument, &self.config),
                };
                let (sender, receiver) =
                    crossbeam::channel::bounded(self.config.event_queue_capacity);
                let worker = std::thread::spawn(move || run_context_blocking(context, receiver));
                slot.insert(StdInstrumentHandle {
                    commands: sender,
                    worker,
                });
                info!("engine: registered instrument {instrument}");
                Ok(())
            }
        }
    }

    /// True when the instrument has a running context.
    #[must_use]
    pub fn is_registered(&self, instrument: InstrumentId) -> bool {
        self.contexts.contains_key(&instrument)
    }

    /// Identifiers of every registered instrument, in no particular order.
    #[must_use]
    pub fn instruments(&self) -> Vec<InstrumentId> {
        self.contexts.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of registered instruments.
    #[must_use]
    pub fn instrument_count(&self) -> usize {
        self.contexts.len()
    }

    fn command_sender(
        &self,
        instrument: InstrumentId,
    ) -> Result<crossbeam::channel::Sender<EngineCommand>, EngineError> {
        self.contexts
            .get(&instrument)
            .map(|handle| handle.commands.clone())
            .ok_or(EngineError::UnknownInstrument(instrument))
    }

    fn request<R>(
        &self,
        instrument: InstrumentId,
        command: EngineCommand,
        reply: oneshot::Receiver<R>,
    ) -> Result<R, EngineError> {
        let sender = self.command_sender(instrument)?;
        sender
            .send(command)
            .map_err(|_| EngineError::ContextStopped(instrument))?;
        reply
            .blocking_recv()
            .map_err(|_| EngineError::ContextStopped(instrument))
    }

    /// Queues one event, blocking while the worker's queue is full.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstrument`] or [`EngineError::ContextStopped`].
    pub fn submit(&self, event: OrderEvent) -> Result<(), EngineError> {
        let sender = self.command_sender(event.instrument)?;
        sender
            .send(EngineCommand::Event(event))
            .map_err(|_| EngineError::ContextStopped(event.instrument))
    }

    /// Attaches a subscriber to the instrument's outbound feed.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstrument`] or [`EngineError::ContextStopped`].
    pub fn subscribe(
        &self,
        instrument: InstrumentId,
        flags: FeedFlags,
    ) -> Result<Subscription, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.request(instrument, EngineCommand::Subscribe { flags, reply: tx }, rx)
    }

    /// Captures a checksummed snapshot of the instrument's book.
    ///
    /// # Errors
    ///
    /// Registry errors, or [`EngineError::Snapshot`] from packaging.
    pub fn snapshot(&self, instrument: InstrumentId) -> Result<SnapshotPackage, EngineError> {
        let (tx, rx) = oneshot::channel();
        let package = self.request(instrument, EngineCommand::Snapshot { reply: tx }, rx)?;
        Ok(package?)
    }

    /// Installs a snapshot into the instrument's context.
    ///
    /// # Errors
    ///
    /// Registry errors, or [`EngineError::Snapshot`] from validation or
    /// restore.
    pub fn install_snapshot(
        &self,
        instrument: InstrumentId,
        package: SnapshotPackage,
    ) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        let result = self.request(
            instrument,
            EngineCommand::InstallSnapshot { package, reply: tx },
            rx,
        )?;
        result?;
        Ok(())
    }

    /// Per-side aggregate view of the instrument's top levels, clamped to
    /// the configured maximum depth.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstrument`] or [`EngineError::ContextStopped`].
    pub fn depth(&self, instrument: InstrumentId, depth: usize) -> Result<DepthView, EngineError> {
        let depth = self.config.clamp_depth(depth);
        let (tx, rx) = oneshot::channel();
        self.request(instrument, EngineCommand::Depth { depth, reply: tx }, rx)
    }

    /// The instrument context's counters.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstrument`] or [`EngineError::ContextStopped`].
    pub fn stats(&self, instrument: InstrumentId) -> Result<ContextStats, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.request(instrument, EngineCommand::Stats { reply: tx }, rx)
    }

    /// Stops every worker thread and joins them.
    pub fn shutdown(self) {
        for (instrument, handle) in self.contexts.into_iter() {
            let _ = handle.commands.send(EngineCommand::Shutdown);
            if handle.worker.join().is_err() {
                error!("engine: worker for instrument {instrument} panicked");
            }
        }
        info!("engine: shut down");
    }
}

impl Default for EngineStd {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
