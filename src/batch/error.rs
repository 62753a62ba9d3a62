use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record {field} too large: {len} bytes")]
    RecordTooLarge { field: &'static str, len: usize },

    #[error("Unsupported log version {found} in {path}")]
    UnsupportedVersion { path: PathBuf, found: u8 },

    #[error("Log directory does not exist: {0}")]
    MissingDirectory(PathBuf),
}

pub type Result<T> = std::result::Result<T, BatchError>;
