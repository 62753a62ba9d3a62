use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{BatchError, Result};
use super::record::{FossilRecord, LOG_VERSION, decode_records};

/// File extension of pending (unsealed) batch logs
pub const LOG_EXTENSION: &str = "log";

/// Identifier of a batch and of its log file
///
/// UUIDv7, so sorting log file names sorts batches by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchId(pub Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse a batch id back out of a `<uuid>.log` path
    pub fn from_log_path(path: &Path) -> Option<Self> {
        if path.extension()? != LOG_EXTENSION {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        Uuid::parse_str(stem).ok().map(Self)
    }

    pub fn log_file_name(&self) -> String {
        format!("{}.{}", self.0, LOG_EXTENSION)
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Append-only log backing one open batch
#[derive(Debug)]
pub struct BatchLog {
    id: BatchId,
    path: PathBuf,
    file: File,
    records: usize,
    len: u64,
}

impl BatchLog {
    /// Create the log for a new batch
    ///
    /// Fails if the file already exists, which guards against id collisions
    /// and against clobbering a log that is still waiting for recovery.
    pub fn create(dir: &Path, id: BatchId) -> Result<Self> {
        if !dir.is_dir() {
            return Err(BatchError::MissingDirectory(dir.to_path_buf()));
        }

        let path = dir.join(id.log_file_name());
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&path)?;
        file.write_all(&[LOG_VERSION])?;
        file.sync_all()?;

        info!(batch_id = %id, path = %path.display(), "Batch log created");

        Ok(Self {
            id,
            path,
            file,
            records: 0,
            len: 1,
        })
    }

    /// Append one record and sync it to disk
    ///
    /// On failure the file is cut back to its previous length (best effort) so
    /// that a half-written frame never sits in front of later records.
    pub fn append(&mut self, record: &FossilRecord) -> Result<()> {
        let frame = record.encode()?;

        if let Err(e) = self.write_frame(&frame) {
            if let Err(truncate_err) = self.truncate_to(self.len) {
                warn!(
                    batch_id = %self.id,
                    error = %truncate_err,
                    "Failed to roll back partial batch log write"
                );
            }
            return Err(e.into());
        }

        self.len += frame.len() as u64;
        self.records += 1;
        debug!(batch_id = %self.id, records = self.records, "Record appended to batch log");
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.file.write_all(frame)?;
        self.file.sync_data()
    }

    fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
        self.file.set_len(len)?;
        self.file.seek(SeekFrom::Start(len))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Swap the write handle for a read-only one so the next append fails
    #[cfg(test)]
    pub(crate) fn fail_writes(&mut self) -> std::io::Result<()> {
        self.file = File::open(&self.path)?;
        Ok(())
    }

    /// Detach the handle, leaving the file on disk for a later recovery pass
    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Delete the log of a sealed batch
pub fn remove_log(path: &Path) -> Result<()> {
    fs::remove_file(path)?;
    debug!(path = %path.display(), "Batch log removed");
    Ok(())
}

/// Keep the log of a sealed batch under `file_name` in the same directory
pub fn archive_log(path: &Path, file_name: &str) -> Result<PathBuf> {
    let target = match path.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    };
    fs::rename(path, &target)?;
    info!(from = %path.display(), to = %target.display(), "Batch log archived");
    Ok(target)
}

/// A pending log found on disk at startup
#[derive(Debug, Clone)]
pub struct RecoveredLog {
    pub id: BatchId,
    pub path: PathBuf,
    pub records: Vec<FossilRecord>,
    pub discarded_bytes: usize,
}

/// Read every complete record from a log file
pub fn read_log(path: &Path) -> Result<(Vec<FossilRecord>, usize)> {
    let bytes = fs::read(path)?;

    let Some((&version, body)) = bytes.split_first() else {
        return Ok((Vec::new(), 0));
    };
    if version != LOG_VERSION {
        return Err(BatchError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: version,
        });
    }

    let decoded = decode_records(body);
    Ok((decoded.records, decoded.discarded_bytes))
}

/// List the pending batch logs in `dir`, oldest first
///
/// Unreadable files are skipped with a warning rather than failing the scan.
/// Archived batches are not `.log` files and are never picked up.
pub fn scan_pending(dir: &Path) -> Result<Vec<RecoveredLog>> {
    let mut found = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(id) = BatchId::from_log_path(&path) else {
            continue;
        };

        match read_log(&path) {
            Ok((records, discarded_bytes)) => {
                if discarded_bytes > 0 {
                    warn!(
                        batch_id = %id,
                        discarded_bytes,
                        recovered = records.len(),
                        "Discarded partial tail of batch log"
                    );
                }
                found.push(RecoveredLog {
                    id,
                    path,
                    records,
                    discarded_bytes,
                });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable batch log");
            }
        }
    }

    found.sort_by_key(|log| log.id);
    info!(dir = %dir.display(), pending = found.len(), "Scanned for pending batch logs");
    Ok(found)
}
