use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use batchfossil::config::{Config, HumanDuration};

#[derive(Parser, Debug)]
#[command(name = "batchfossil")]
#[command(about = "Batch fossilizer: Merkle-batched proofs of existence", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the fossilizer with its HTTP API
    Serve(ServeArgs),
}

/// Flags override the configuration file and environment
#[derive(clap::Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Time a batch collects leaves before it is sealed (e.g. "30s", "10m")
    #[arg(long)]
    pub interval: Option<HumanDuration>,

    /// Seal a batch as soon as it holds this many leaves
    #[arg(long = "max-leaves", alias = "maxleaves")]
    pub max_leaves: Option<usize>,

    /// Number of batches that may be sealed concurrently
    #[arg(long = "max-sim-batches", alias = "maxsimbatches")]
    pub max_sim_batches: Option<usize>,

    /// Directory for batch logs
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Keep sealed batch logs, named after their Merkle root
    #[arg(long)]
    pub archive: bool,

    /// Seal the open batch on shutdown instead of leaving it for recovery
    #[arg(long = "stop-batch", alias = "stopbatch")]
    pub stop_batch: bool,
}

impl ServeArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(address) = self.address {
            config.server.bind_addr = address;
        }
        let fossilizer = &mut config.fossilizer;
        if let Some(interval) = self.interval {
            fossilizer.interval = interval;
        }
        if let Some(max_leaves) = self.max_leaves {
            fossilizer.max_leaves = max_leaves;
        }
        if let Some(max_sim_batches) = self.max_sim_batches {
            fossilizer.max_sim_batches = max_sim_batches;
        }
        if let Some(path) = &self.path {
            fossilizer.path = path.clone();
        }
        // Flags can only switch these on
        fossilizer.archive |= self.archive;
        fossilizer.stop_batch |= self.stop_batch;
    }
}
