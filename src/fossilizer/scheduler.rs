//! Batch lifecycle state machine
//!
//! `BatchSlot` owns the single open batch. Every transition goes through one
//! of its methods while the caller holds the slot lock, which is what makes
//! the swap from a full batch to a fresh one atomic for concurrent
//! `fossilize` callers. Nothing in here touches timers; the scheduler loop
//! decides *when* to call `seal_if`, the slot decides *whether* anything
//! happens.

use std::fmt;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::batch::{
    BatchError, BatchId, BatchLog, FossilRecord, RecoveredLog, archive_log, remove_log,
};

/// Lifecycle of a batch: `Empty -> Collecting -> Sealing -> Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Empty,
    Collecting,
    Sealing,
    Closed,
}

/// Wall-clock source for batch timestamps
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time as unix seconds
    fn now_unix(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

/// A batch of fossil records and the log that backs it
#[derive(Debug)]
pub struct Batch {
    id: BatchId,
    seq: u64,
    created_at: i64,
    leaves: Vec<FossilRecord>,
    state: BatchState,
    log: Option<BatchLog>,
    log_path: Option<PathBuf>,
    recovered: bool,
}

impl Batch {
    fn empty(seq: u64, created_at: i64) -> Self {
        Self {
            id: BatchId::new(),
            seq,
            created_at,
            leaves: Vec::new(),
            state: BatchState::Empty,
            log: None,
            log_path: None,
            recovered: false,
        }
    }

    /// Rebuild a batch from a log left behind by a previous process
    ///
    /// The batch starts out in `Sealing`: it never accepts new leaves.
    pub fn recovered(log: RecoveredLog, seq: u64, created_at: i64) -> Self {
        Self {
            id: log.id,
            seq,
            created_at,
            leaves: log.records,
            state: BatchState::Sealing,
            log: None,
            log_path: Some(log.path),
            recovered: true,
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn leaves(&self) -> &[FossilRecord] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Close the file handle and freeze the leaf set
    fn begin_sealing(mut self) -> Self {
        if let Some(log) = self.log.take() {
            self.log_path = Some(log.into_path());
        }
        self.state = BatchState::Sealing;
        self
    }

    /// Drop the log of a sealed batch: delete it, or keep it as `archive_name`
    pub fn close(mut self, archive_name: Option<&str>) -> Result<Option<PathBuf>, BatchError> {
        debug_assert_eq!(self.state, BatchState::Sealing);
        let archived = match (self.log_path.take(), archive_name) {
            (Some(path), Some(name)) => Some(archive_log(&path, name)?),
            (Some(path), None) => {
                remove_log(&path)?;
                None
            }
            (None, _) => None,
        };
        self.state = BatchState::Closed;
        debug!(batch_id = %self.id, seq = self.seq, "Batch closed");
        Ok(archived)
    }
}

/// What an accepted append did to the slot
#[derive(Debug, Default)]
pub struct AppendOutcome {
    /// Sequence number of a batch that just moved from `Empty` to `Collecting`
    pub started: Option<u64>,
    /// A batch that reached capacity and was swapped out for sealing
    pub full: Option<Batch>,
}

/// A rejected append
///
/// The open batch is retired on a log write failure; whatever it already held
/// is handed back for sealing so accepted leaves are not stranded.
#[derive(Debug)]
pub struct AppendFailure {
    pub error: BatchError,
    pub retired: Option<Batch>,
}

/// Holder of the one open batch
#[derive(Debug)]
pub struct BatchSlot {
    dir: PathBuf,
    max_leaves: usize,
    next_seq: u64,
    current: Batch,
}

impl BatchSlot {
    pub fn new(dir: PathBuf, max_leaves: usize, first_seq: u64, now: i64) -> Self {
        Self {
            dir,
            max_leaves: max_leaves.max(1),
            next_seq: first_seq + 1,
            current: Batch::empty(first_seq, now),
        }
    }

    pub fn current_seq(&self) -> u64 {
        self.current.seq
    }

    pub fn state(&self) -> BatchState {
        self.current.state
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Add a record to the open batch, durably
    ///
    /// The first record opens the batch log. Reaching `max_leaves` swaps the
    /// batch out in the same call, so the cap can never be overshot.
    pub fn append(
        &mut self,
        record: FossilRecord,
        now: i64,
    ) -> std::result::Result<AppendOutcome, AppendFailure> {
        let mut outcome = AppendOutcome::default();

        if self.current.state == BatchState::Empty {
            let log = BatchLog::create(&self.dir, self.current.id).map_err(|error| AppendFailure {
                error,
                retired: None,
            })?;
            self.current.log_path = Some(log.path().to_path_buf());
            self.current.log = Some(log);
            self.current.created_at = now;
            self.current.state = BatchState::Collecting;
            outcome.started = Some(self.current.seq);
            info!(batch_id = %self.current.id, seq = self.current.seq, "Batch collecting");
        }

        let write = match self.current.log.as_mut() {
            Some(log) => log.append(&record),
            None => Ok(()),
        };
        if let Err(error) = write {
            warn!(batch_id = %self.current.id, error = %error, "Batch log append failed, retiring batch");
            return Err(AppendFailure {
                error,
                retired: self.retire(now),
            });
        }

        self.current.leaves.push(record);
        if self.current.leaves.len() >= self.max_leaves {
            outcome.full = Some(self.swap(now));
        }

        Ok(outcome)
    }

    /// Timer expiry for batch `seq`
    ///
    /// Returns nothing when that batch is already gone (sealed at capacity) or
    /// never collected anything.
    pub fn seal_if(&mut self, seq: u64, now: i64) -> Option<Batch> {
        if self.current.seq != seq || self.current.state != BatchState::Collecting {
            return None;
        }
        Some(self.swap(now))
    }

    /// Swap out the open batch regardless of its age (shutdown flush)
    pub fn seal_open(&mut self, now: i64) -> Option<Batch> {
        if self.current.state != BatchState::Collecting {
            return None;
        }
        Some(self.swap(now))
    }

    /// Write handle of the open batch
    #[cfg(test)]
    pub(crate) fn open_log_mut(&mut self) -> Option<&mut BatchLog> {
        self.current.log.as_mut()
    }

    fn swap(&mut self, now: i64) -> Batch {
        let fresh = Batch::empty(self.next_seq, now);
        self.next_seq += 1;
        let batch = std::mem::replace(&mut self.current, fresh).begin_sealing();
        debug!(batch_id = %batch.id, leaves = batch.len(), "Batch swapped out for sealing");
        batch
    }

    fn retire(&mut self, now: i64) -> Option<Batch> {
        let batch = self.swap(now);
        if !batch.is_empty() {
            return Some(batch);
        }
        // Nothing accepted yet, the log holds only its header
        if let Err(e) = batch.close(None) {
            warn!(error = %e, "Failed to remove empty batch log");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::read_log;
    use tempfile::TempDir;

    fn record(i: usize) -> FossilRecord {
        FossilRecord::new(format!("data {}", i), format!("meta {}", i))
    }

    fn slot(dir: &TempDir, max_leaves: usize) -> BatchSlot {
        BatchSlot::new(dir.path().to_path_buf(), max_leaves, 0, 100)
    }

    fn log_count(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[test]
    fn test_first_append_starts_collecting() {
        let dir = TempDir::new().unwrap();
        let mut slot = slot(&dir, 4);
        assert_eq!(slot.state(), BatchState::Empty);
        assert_eq!(log_count(&dir), 0);

        let outcome = slot.append(record(0), 101).unwrap();
        assert_eq!(outcome.started, Some(0));
        assert!(outcome.full.is_none());
        assert_eq!(slot.state(), BatchState::Collecting);
        assert_eq!(log_count(&dir), 1);

        let outcome = slot.append(record(1), 102).unwrap();
        assert_eq!(outcome.started, None);
        assert_eq!(slot.len(), 2);
    }

    #[test]
    fn test_capacity_swaps_batch() {
        let dir = TempDir::new().unwrap();
        let mut slot = slot(&dir, 4);

        let mut sealed = Vec::new();
        for i in 0..7 {
            if let Some(batch) = slot.append(record(i), 100).unwrap().full {
                sealed.push(batch);
            }
        }

        assert_eq!(sealed.len(), 1);
        let batch = &sealed[0];
        assert_eq!(batch.state(), BatchState::Sealing);
        assert_eq!(batch.leaves(), &[record(0), record(1), record(2), record(3)]);
        assert_eq!(slot.current_seq(), 1);
        assert_eq!(slot.len(), 3);

        // The sealing batch's log still holds exactly its leaves
        let (on_disk, _) = read_log(batch.log_path().unwrap()).unwrap();
        assert_eq!(on_disk, batch.leaves());
    }

    #[test]
    fn test_max_leaves_one_starts_and_fills() {
        let dir = TempDir::new().unwrap();
        let mut slot = slot(&dir, 1);

        let outcome = slot.append(record(0), 100).unwrap();
        assert_eq!(outcome.started, Some(0));
        assert_eq!(outcome.full.unwrap().len(), 1);
        assert_eq!(slot.state(), BatchState::Empty);
    }

    #[test]
    fn test_seal_if_matches_sequence() {
        let dir = TempDir::new().unwrap();
        let mut slot = slot(&dir, 10);

        // Timer for an empty batch does nothing
        assert!(slot.seal_if(0, 100).is_none());

        slot.append(record(0), 100).unwrap();
        assert!(slot.seal_if(7, 100).is_none());

        let batch = slot.seal_if(0, 110).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(slot.current_seq(), 1);

        // A stale timer for the batch just sealed is ignored
        slot.append(record(1), 111).unwrap();
        assert!(slot.seal_if(0, 112).is_none());
        assert_eq!(slot.len(), 1);
    }

    #[test]
    fn test_seal_open_only_when_collecting() {
        let dir = TempDir::new().unwrap();
        let mut slot = slot(&dir, 10);
        assert!(slot.seal_open(100).is_none());

        slot.append(record(0), 100).unwrap();
        slot.append(record(1), 100).unwrap();
        let batch = slot.seal_open(100).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(slot.seal_open(100).is_none());
    }

    #[test]
    fn test_close_removes_or_archives() {
        let dir = TempDir::new().unwrap();
        let mut slot = slot(&dir, 1);

        let first = slot.append(record(0), 100).unwrap().full.unwrap();
        let first_path = first.log_path().unwrap().to_path_buf();
        assert_eq!(first.close(None).unwrap(), None);
        assert!(!first_path.exists());

        let second = slot.append(record(1), 100).unwrap().full.unwrap();
        let archived = second.close(Some("rootname")).unwrap().unwrap();
        assert_eq!(archived, dir.path().join("rootname"));
        assert!(archived.exists());
    }

    #[test]
    fn test_append_failure_retires_batch_with_accepted_leaves() {
        let dir = TempDir::new().unwrap();
        let mut slot = slot(&dir, 10);
        slot.append(record(0), 100).unwrap();
        slot.append(record(1), 100).unwrap();

        slot.open_log_mut().unwrap().fail_writes().unwrap();
        let failure = slot.append(record(2), 101).unwrap_err();
        assert!(matches!(failure.error, BatchError::Io(_)));

        // Accepted leaves go on to sealing, the rejected one is not among them
        let retired = failure.retired.unwrap();
        assert_eq!(retired.state(), BatchState::Sealing);
        assert_eq!(retired.leaves(), &[record(0), record(1)]);
        let (on_disk, _) = read_log(retired.log_path().unwrap()).unwrap();
        assert_eq!(on_disk, vec![record(0), record(1)]);

        assert_eq!(slot.state(), BatchState::Empty);
        assert_eq!(slot.current_seq(), 1);

        // The next record opens a fresh log
        let outcome = slot.append(record(3), 102).unwrap();
        assert_eq!(outcome.started, Some(1));
        assert_eq!(log_count(&dir), 2);
    }

    #[test]
    fn test_open_failure_keeps_slot_empty() {
        let dir = TempDir::new().unwrap();
        let mut slot = BatchSlot::new(dir.path().join("missing"), 4, 0, 100);

        let failure = slot.append(record(0), 100).unwrap_err();
        assert!(matches!(failure.error, BatchError::MissingDirectory(_)));
        assert!(failure.retired.is_none());
        assert_eq!(slot.state(), BatchState::Empty);
        assert!(slot.is_empty());
    }

    #[test]
    fn test_recovered_batch_is_sealing() {
        let dir = TempDir::new().unwrap();
        let recovered = RecoveredLog {
            id: BatchId::new(),
            path: dir.path().join("x.log"),
            records: vec![record(0), record(1)],
            discarded_bytes: 0,
        };
        let batch = Batch::recovered(recovered, 3, 50);
        assert_eq!(batch.state(), BatchState::Sealing);
        assert!(batch.is_recovered());
        assert_eq!(batch.seq(), 3);
        assert_eq!(batch.len(), 2);
    }
}
