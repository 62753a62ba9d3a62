//! Bounded index of recently emitted results
//!
//! Fed by an event channel registered on the fossilizer. Keyed by leaf data;
//! when the same data is fossilized twice the newest result wins. The oldest
//! entry is evicted once `capacity` is reached.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::evidence::FossilResult;
use crate::fossilizer::Event;

#[derive(Debug, Default)]
struct Entries {
    by_data: HashMap<Vec<u8>, FossilResult>,
    order: VecDeque<Vec<u8>>,
}

#[derive(Debug)]
pub struct RecentResults {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl RecentResults {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, result: FossilResult) {
        let mut entries = self.lock();
        let key = result.data.clone();

        if entries.by_data.insert(key.clone(), result).is_some() {
            entries.order.retain(|existing| existing != &key);
        }
        entries.order.push_back(key);

        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.by_data.remove(&oldest);
            }
        }
    }

    pub fn get(&self, data: &[u8]) -> Option<FossilResult> {
        self.lock().by_data.get(data).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().by_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain `events` into the index until the channel closes
    pub fn collect(self: Arc<Self>, mut events: mpsc::Receiver<Event>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(Event::DidFossilize(result)) = events.recv().await {
                self.insert(result);
            }
            debug!("Result collector stopped");
        })
    }
}
