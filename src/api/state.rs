use std::sync::Arc;

use tokio::sync::mpsc;

use super::results::RecentResults;
use crate::config::Config;
use crate::fossilizer::Fossilizer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fossilizer: Fossilizer,
    pub results: Arc<RecentResults>,
}

impl AppState {
    /// Wire the result index to the fossilizer's events
    ///
    /// Spawns the collector task, so it must run inside a tokio runtime.
    pub fn new(config: Config, fossilizer: Fossilizer) -> Self {
        let results = Arc::new(RecentResults::new(config.server.recent_results));
        let (tx, rx) = mpsc::channel(config.server.event_buffer);
        fossilizer.add_event_channel(tx);
        results.clone().collect(rx);

        Self {
            config: Arc::new(config),
            fossilizer,
            results,
        }
    }
}
