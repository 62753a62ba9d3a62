use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::evidence::FossilResult;
use crate::observability::Metrics;

/// Event emitted by the fossilizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A record was sealed into a batch and its evidence is ready
    DidFossilize(FossilResult),
}

impl Event {
    pub fn result(&self) -> &FossilResult {
        match self {
            Event::DidFossilize(result) => result,
        }
    }
}

/// Registered consumer
struct Subscriber {
    id: usize,
    sink: mpsc::Sender<Event>,
}

/// Delivers every event to every registered channel
///
/// Delivery is a blocking send: [`EventFanout::publish`] returns only once
/// each consumer's channel has accepted every event, and the sealing task
/// closes the batch log after that. The consumer's own channel is therefore
/// the bounded per-consumer queue, and a full channel makes the sealing task
/// wait. Consumers are served concurrently, so a stalled consumer holds back
/// its own results and the sealing slot it occupies, never the delivery to
/// other consumers or ingestion of new records.
#[derive(Clone)]
pub struct EventFanout {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    next_id: Arc<AtomicUsize>,
    metrics: Arc<Metrics>,
}

impl EventFanout {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicUsize::new(0)),
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a consumer; returns its subscriber id
    pub fn add(&self, sink: mpsc::Sender<Event>) -> usize {
        // Ids are never reused, pruning after a concurrent publish relies on it
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push(Subscriber { id, sink });
        debug!(subscriber = id, "Event channel added");
        id
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deliver `events` to every consumer, in order
    ///
    /// Resolves once every live consumer has accepted every event. Consumers
    /// whose receiver has been dropped are removed.
    pub async fn publish(&self, events: &[Event]) {
        let targets: Vec<(usize, mpsc::Sender<Event>)> = self
            .lock()
            .iter()
            .map(|subscriber| (subscriber.id, subscriber.sink.clone()))
            .collect();
        if targets.is_empty() || events.is_empty() {
            return;
        }

        let events: Arc<[Event]> = events.into();
        let mut deliveries = JoinSet::new();
        for (id, sink) in targets {
            let events = events.clone();
            let metrics = self.metrics.clone();
            deliveries.spawn(async move { deliver(id, sink, &events, &metrics).await });
        }

        let mut closed = Vec::new();
        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok(Some(id)) => closed.push(id),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Event delivery task failed"),
            }
        }

        if !closed.is_empty() {
            self.lock().retain(|subscriber| {
                let keep = !closed.contains(&subscriber.id);
                if !keep {
                    warn!(subscriber = subscriber.id, "Event channel closed, removing");
                }
                keep
            });
        }
    }
}

/// Send `events` to one consumer; returns its id if the consumer is gone
async fn deliver(
    id: usize,
    sink: mpsc::Sender<Event>,
    events: &[Event],
    metrics: &Metrics,
) -> Option<usize> {
    for event in events {
        if sink.send(event.clone()).await.is_err() {
            debug!(subscriber = id, "Event consumer dropped its receiver");
            return Some(id);
        }
        metrics.event_delivered();
    }
    None
}

impl std::fmt::Debug for EventFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFanout")
            .field("subscribers", &self.len())
            .finish()
    }
}
