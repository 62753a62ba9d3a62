//! Batch fossilizer
//!
//! Collects fossil records into batches, seals each batch into a Merkle tree
//! and emits one [`Event`] per record carrying its evidence.
//!
//! ## Flow
//!
//! ```text
//! fossilize() ──► BatchSlot (log + leaves) ──full/timer──► seal queue
//!                                                             │
//!                        semaphore (max_sim_batches) ◄────────┘
//!                                 │
//!                    Merkle ► evidence ► fan-out ► remove/archive log
//! ```
//!
//! Three kinds of task cooperate:
//! 1. callers of [`Fossilizer::fossilize`], serialized by the slot lock
//! 2. the scheduler loop in [`Fossilizer::start`], which owns the interval timer
//! 3. a dispatcher that hands queued batches to at most `max_sim_batches`
//!    concurrent sealing tasks
//!
//! Batch logs left behind by a previous process are picked up by
//! [`Fossilizer::new`] and sealed first once the scheduler starts.

mod events;
mod scheduler;
mod sealer;

pub use events::{Event, EventFanout};
pub use scheduler::{Batch, BatchSlot, BatchState, Clock, SystemClock};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::batch::{BatchError, FossilRecord, scan_pending};
use crate::config::{FossilizerConfig, validate_fossilizer};
use crate::evidence::{Evidence, EvidenceBuilder, FossilResult, TransformError, Transformer};
use crate::observability::{Metrics, MetricsSnapshot};
use sealer::{SealContext, seal_batch};

const NAME: &str = "batch";
const DESCRIPTION: &str = "Batch fossilizer: Merkle batches of records sealed on an interval";

#[derive(Debug, Error)]
pub enum FossilizerError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Batch log error: {0}")]
    Log(#[from] BatchError),

    #[error("Fossilizer already started")]
    AlreadyStarted,

    #[error("Fossilizer stopped")]
    Stopped,
}

impl FossilizerError {
    /// True for the cancellation result of [`Fossilizer::start`]
    pub fn is_stopped(&self) -> bool {
        matches!(self, FossilizerError::Stopped)
    }
}

pub type Result<T> = std::result::Result<T, FossilizerError>;

/// Fossilizer identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    pub name: String,
    pub description: String,
    pub version: String,
    pub commit: String,
}

/// Handle to a batch fossilizer; clones share the same instance
#[derive(Clone)]
pub struct Fossilizer {
    inner: Arc<Inner>,
}

struct Inner {
    config: FossilizerConfig,
    slot: tokio::sync::Mutex<BatchSlot>,
    seal_tx: mpsc::UnboundedSender<Batch>,
    seal_rx: Mutex<Option<mpsc::UnboundedReceiver<Batch>>>,
    /// (batch seq, moment it started collecting)
    timer_tx: mpsc::UnboundedSender<(u64, Instant)>,
    timer_rx: Mutex<Option<mpsc::UnboundedReceiver<(u64, Instant)>>>,
    fanout: EventFanout,
    transformer: RwLock<Option<Transformer>>,
    semaphore: Arc<Semaphore>,
    started: watch::Sender<bool>,
    stopped: AtomicBool,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl Fossilizer {
    /// Create a fossilizer and queue any batch logs found under `config.path`
    ///
    /// Zero values in `config` are replaced by defaults. Does not start the
    /// scheduler.
    pub fn new(config: FossilizerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`Fossilizer::new`] with an explicit source of seal timestamps
    pub fn with_clock(config: FossilizerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let config = config.normalized();
        validate_fossilizer(&config).map_err(|e| FossilizerError::Config(e.to_string()))?;

        std::fs::create_dir_all(&config.path).map_err(|e| {
            FossilizerError::Config(format!(
                "cannot create batch directory {}: {}",
                config.path.display(),
                e
            ))
        })?;

        let metrics = Arc::new(Metrics::new());
        let (seal_tx, seal_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let now = clock.now_unix();

        let mut seq = 0;
        for log in scan_pending(&config.path)? {
            if log.records.is_empty() {
                debug!(batch_id = %log.id, "Removing batch log with no records");
                if let Err(e) = std::fs::remove_file(&log.path) {
                    warn!(batch_id = %log.id, error = %e, "Failed to remove empty batch log");
                }
                continue;
            }

            info!(
                batch_id = %log.id,
                leaves = log.records.len(),
                "Recovered pending batch"
            );
            // The receiver is held in `seal_rx` below, send cannot fail
            let _ = seal_tx.send(Batch::recovered(log, seq, now));
            metrics.batch_recovered();
            seq += 1;
        }

        info!(
            path = %config.path.display(),
            interval = %config.interval,
            max_leaves = config.max_leaves,
            max_sim_batches = config.max_sim_batches,
            recovered = seq,
            "Fossilizer created"
        );

        let slot = BatchSlot::new(config.path.clone(), config.max_leaves, seq, now);
        let (started, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(Inner {
                semaphore: Arc::new(Semaphore::new(config.max_sim_batches)),
                config,
                slot: tokio::sync::Mutex::new(slot),
                seal_tx,
                seal_rx: Mutex::new(Some(seal_rx)),
                timer_tx,
                timer_rx: Mutex::new(Some(timer_rx)),
                fanout: EventFanout::new(metrics.clone()),
                transformer: RwLock::new(None),
                started,
                stopped: AtomicBool::new(false),
                clock,
                metrics,
            }),
        })
    }

    pub fn config(&self) -> &FossilizerConfig {
        &self.inner.config
    }

    /// Run the scheduler until `shutdown` completes
    ///
    /// Always ends with [`FossilizerError::Stopped`] unless it fails earlier.
    /// With `stop_batch` the open batch and every queued batch are sealed, and
    /// their events accepted by every consumer channel, before this returns.
    /// Otherwise the open batch is left on disk for the next process to
    /// recover.
    pub async fn start<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (seal_rx, mut timer_rx) = self.take_receivers()?;
        let inner = &self.inner;

        let (drain_tx, drain_rx) = watch::channel(false);
        let dispatcher = tokio::spawn(dispatch(inner.clone(), seal_rx, drain_rx));

        inner.started.send_replace(true);
        info!("Fossilizer started");

        let interval = inner.config.interval.as_duration();
        let mut deadline: Option<(Instant, u64)> = None;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                Some((seq, since)) = timer_rx.recv() => {
                    deadline = Some((since + interval, seq));
                }

                _ = async {
                    match deadline {
                        Some((at, _)) => sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                } => {
                    if let Some((_, seq)) = deadline.take() {
                        let now = inner.clock.now_unix();
                        if let Some(batch) = inner.slot.lock().await.seal_if(seq, now) {
                            info!(batch_id = %batch.id(), leaves = batch.len(), "Interval elapsed, sealing batch");
                            inner.queue(batch);
                        }
                    }
                }
            }
        }

        self.stop(drain_tx, dispatcher).await;
        Err(FossilizerError::Stopped)
    }

    fn take_receivers(
        &self,
    ) -> Result<(mpsc::UnboundedReceiver<Batch>, mpsc::UnboundedReceiver<(u64, Instant)>)> {
        let mut seal_rx = lock(&self.inner.seal_rx);
        let mut timer_rx = lock(&self.inner.timer_rx);
        match (seal_rx.take(), timer_rx.take()) {
            (Some(seal), Some(timer)) => Ok((seal, timer)),
            _ => Err(FossilizerError::AlreadyStarted),
        }
    }

    async fn stop(&self, drain_tx: watch::Sender<bool>, dispatcher: tokio::task::JoinHandle<()>) {
        let inner = &self.inner;
        let mut slot = inner.slot.lock().await;
        inner.stopped.store(true, Ordering::SeqCst);

        if !inner.config.stop_batch {
            info!(
                open_leaves = slot.len(),
                "Fossilizer stopping, open batch left for recovery"
            );
            return;
        }

        if let Some(batch) = slot.seal_open(inner.clock.now_unix()) {
            info!(batch_id = %batch.id(), leaves = batch.len(), "Flushing open batch on shutdown");
            inner.queue(batch);
        }
        drop(slot);

        drain_tx.send_replace(true);
        if let Err(e) = dispatcher.await {
            error!(error = %e, "Seal dispatcher failed");
        }
        info!("Fossilizer stopped, all batches sealed");
    }

    /// Durably add a record to the open batch
    ///
    /// Returns once the record is on disk. Errors mean the record was not
    /// accepted.
    pub async fn fossilize(&self, data: impl Into<Vec<u8>>, meta: impl Into<Vec<u8>>) -> Result<()> {
        let inner = &self.inner;
        let record = FossilRecord::new(data, meta);

        let mut slot = inner.slot.lock().await;
        if inner.stopped.load(Ordering::SeqCst) {
            return Err(FossilizerError::Stopped);
        }

        match slot.append(record, inner.clock.now_unix()) {
            Ok(outcome) => {
                if let Some(seq) = outcome.started {
                    // Receiver lives in `Inner` until start and in the loop after
                    let _ = inner.timer_tx.send((seq, Instant::now()));
                }
                if let Some(batch) = outcome.full {
                    debug!(batch_id = %batch.id(), leaves = batch.len(), "Batch full, sealing");
                    inner.queue(batch);
                }
                inner.metrics.leaf_accepted();
                Ok(())
            }
            Err(failure) => {
                if let Some(batch) = failure.retired {
                    inner.queue(batch);
                }
                Err(failure.error.into())
            }
        }
    }

    /// Register a consumer for [`Event`]s; allowed before or after start
    pub fn add_event_channel(&self, tx: mpsc::Sender<Event>) {
        self.inner.fanout.add(tx);
    }

    /// Install the hook applied to every result before it is emitted
    pub fn set_transformer<F>(&self, transformer: F)
    where
        F: Fn(Evidence, &[u8], &[u8]) -> std::result::Result<FossilResult, TransformError>
            + Send
            + Sync
            + 'static,
    {
        let transformer: Transformer = Arc::new(transformer);
        *self
            .inner
            .transformer
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(transformer);
    }

    pub fn get_info(&self) -> Info {
        let config = &self.inner.config;
        Info {
            name: NAME.to_string(),
            description: DESCRIPTION.to_string(),
            version: config.version.clone(),
            commit: config.commit.clone(),
        }
    }

    /// Resolves once the scheduler loop is running
    pub async fn started(&self) {
        let mut rx = self.inner.started.subscribe();
        // The sender lives as long as `self`
        let _ = rx.wait_for(|started| *started).await;
    }

    pub fn is_started(&self) -> bool {
        *self.inner.started.borrow()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }
}

impl Inner {
    fn queue(&self, batch: Batch) {
        if let Err(e) = self.seal_tx.send(batch) {
            // Dispatcher gone: the log stays on disk for recovery
            warn!(batch_id = %e.0.id(), "Seal queue closed, batch left for recovery");
        }
    }

    fn seal_context(&self) -> SealContext {
        let transformer = self
            .transformer
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        SealContext {
            builder: EvidenceBuilder::new(self.config.provider.clone()).with_transformer(transformer),
            fanout: self.fanout.clone(),
            archive: self.config.archive,
            clock: self.clock.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Hand queued batches to sealing tasks, at most `max_sim_batches` at a time
///
/// A permit is taken before a task is spawned, so a full pool holds further
/// batches in the queue. Once `drain` flips, the queue is emptied and every
/// running task awaited.
async fn dispatch(
    inner: Arc<Inner>,
    mut seal_rx: mpsc::UnboundedReceiver<Batch>,
    mut drain: watch::Receiver<bool>,
) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                log_join(joined);
            }

            batch = seal_rx.recv() => {
                let Some(batch) = batch else { break };
                spawn_seal(&inner, &mut tasks, batch).await;
            }

            changed = drain.changed() => {
                if changed.is_err() || *drain.borrow() {
                    while let Ok(batch) = seal_rx.try_recv() {
                        spawn_seal(&inner, &mut tasks, batch).await;
                    }
                    break;
                }
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        log_join(joined);
    }
    debug!("Seal dispatcher finished");
}

async fn spawn_seal(inner: &Arc<Inner>, tasks: &mut JoinSet<()>, batch: Batch) {
    let Ok(permit) = inner.semaphore.clone().acquire_owned().await else {
        warn!(batch_id = %batch.id(), "Seal semaphore closed, batch left for recovery");
        return;
    };
    let ctx = inner.seal_context();
    tasks.spawn(async move {
        // Failures are logged inside and leave the log for recovery
        if let Ok(report) = seal_batch(batch, &ctx).await {
            debug!(
                root = %report.root,
                leaves = report.leaves,
                archived = ?report.archived,
                "Seal task finished"
            );
        }
        drop(permit);
    });
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Sealing task panicked");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl fmt::Debug for Fossilizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fossilizer")
            .field("config", &self.inner.config)
            .field("fanout", &self.inner.fanout)
            .finish()
    }
}
