use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub fossilizer: FossilizerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Batch fossilizer settings
///
/// Zero values are treated as unset and replaced by the defaults, see
/// [`FossilizerConfig::normalized`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FossilizerConfig {
    /// Maximum time a batch collects leaves before it is sealed
    #[serde(default = "default_interval")]
    pub interval: HumanDuration,
    /// Seal as soon as a batch holds this many leaves
    #[serde(default = "default_max_leaves")]
    pub max_leaves: usize,
    /// Upper bound on batches being sealed concurrently
    #[serde(default = "default_max_sim_batches")]
    pub max_sim_batches: usize,
    /// Directory holding the batch logs
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Keep sealed logs, renamed after their Merkle root
    #[serde(default)]
    pub archive: bool,
    /// Seal the open batch on shutdown instead of leaving it for recovery
    #[serde(default)]
    pub stop_batch: bool,
    /// Identifies this deployment in emitted evidence
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub commit: String,
}

impl Default for FossilizerConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            max_leaves: default_max_leaves(),
            max_sim_batches: default_max_sim_batches(),
            path: default_path(),
            archive: false,
            stop_batch: false,
            provider: default_provider(),
            version: default_version(),
            commit: String::new(),
        }
    }
}

impl FossilizerConfig {
    /// Replace zero/empty values with their defaults
    pub fn normalized(mut self) -> Self {
        if self.interval.is_zero() {
            self.interval = default_interval();
        }
        if self.max_leaves == 0 {
            self.max_leaves = default_max_leaves();
        }
        if self.max_sim_batches == 0 {
            self.max_sim_batches = default_max_sim_batches();
        }
        if self.path.as_os_str().is_empty() {
            self.path = default_path();
        }
        if self.provider.is_empty() {
            self.provider = default_provider();
        }
        if self.version.is_empty() {
            self.version = default_version();
        }
        self
    }
}

pub(crate) fn default_interval() -> HumanDuration {
    HumanDuration::from_secs(10 * 60)
}

pub(crate) fn default_max_leaves() -> usize {
    32 * 1024
}

pub(crate) fn default_max_sim_batches() -> usize {
    1
}

fn default_path() -> PathBuf {
    PathBuf::from("data/batches")
}

fn default_provider() -> String {
    "batchfossil".to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Number of recent results kept for `GET /results/{data}`
    #[serde(default = "default_recent_results")]
    pub recent_results: usize,
    /// Capacity of the server's own event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            recent_results: default_recent_results(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 6000))
}

fn default_recent_results() -> usize {
    10_000
}

fn default_event_buffer() -> usize {
    256
}
