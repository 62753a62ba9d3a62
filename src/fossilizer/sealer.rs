use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::events::{Event, EventFanout};
use super::scheduler::{Batch, Clock};
use crate::evidence::{EvidenceBuilder, EvidenceError};
use crate::merkle::Hash;
use crate::observability::Metrics;

/// Everything a sealing task needs, captured when the task is spawned
#[derive(Debug, Clone)]
pub(crate) struct SealContext {
    pub builder: EvidenceBuilder,
    pub fanout: EventFanout,
    pub archive: bool,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<Metrics>,
}

/// Outcome of a successful seal
#[derive(Debug)]
pub(crate) struct SealReport {
    pub root: Hash,
    pub leaves: usize,
    pub archived: Option<PathBuf>,
}

/// Run one batch through Merkle -> evidence -> fan-out -> close
///
/// The log is closed only after every consumer has accepted the batch's
/// events, so a crash before that point replays the batch on recovery. On
/// failure nothing is published and the log stays on disk.
pub(crate) async fn seal_batch(batch: Batch, ctx: &SealContext) -> Result<SealReport, EvidenceError> {
    let batch_id = batch.id();
    let timestamp = ctx.clock.now_unix();

    let sealed = match ctx.builder.seal(batch.leaves(), timestamp) {
        Ok(sealed) => sealed,
        Err(e) => {
            error!(
                batch_id = %batch_id,
                leaves = batch.len(),
                error = %e,
                "Failed to seal batch, log retained for recovery"
            );
            ctx.metrics.seal_failed();
            return Err(e);
        }
    };

    let events: Vec<Event> = sealed
        .results
        .into_iter()
        .map(Event::DidFossilize)
        .collect();
    ctx.fanout.publish(&events).await;

    let leaves = batch.len();
    let recovered = batch.is_recovered();
    let archive_name = ctx.archive.then(|| sealed.root.to_hex());
    let archived = match batch.close(archive_name.as_deref()) {
        Ok(archived) => archived,
        Err(e) => {
            // Results are out; a leftover log only means a duplicate on recovery
            warn!(batch_id = %batch_id, error = %e, "Failed to close batch log");
            None
        }
    };

    ctx.metrics.batch_sealed();
    info!(
        batch_id = %batch_id,
        leaves,
        root = %sealed.root,
        recovered,
        archived = archived.is_some(),
        "Batch sealed"
    );

    Ok(SealReport {
        root: sealed.root,
        leaves,
        archived,
    })
}
