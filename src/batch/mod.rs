/// Durable batch log: the on-disk half of an open batch
///
/// Every fossil record accepted by the fossilizer is appended to a per-batch
/// log file under the configured directory before the call returns. The log
/// directory doubles as the recovery queue: each `<uuid>.log` file is an
/// independently replayable batch, so no central index is needed.
///
/// ## File layout
///
/// ```text
/// [version: u8 = 1]
/// repeated:
///   [data_len: u32 BE][meta_len: u32 BE][data][meta][crc32: u32 BE]
/// ```
///
/// The checksum covers both lengths and both payloads. Decoding stops at the
/// first incomplete or checksum-failing record, which drops the partial tail a
/// crash mid-write leaves behind.
///
/// ## Lifecycle
///
/// - `BatchLog::create` opens the file exclusively (`create_new`)
/// - `BatchLog::append` writes and syncs one record
/// - `BatchLog::into_path` drops the handle when the batch starts sealing
/// - `remove_log` / `archive_log` dispose of the file once the batch is sealed
/// - `scan_pending` lists the logs a previous process left behind

pub mod error;
pub mod log;
pub mod record;

pub use error::{BatchError, Result};
pub use log::{
    BatchId, BatchLog, LOG_EXTENSION, RecoveredLog, archive_log, read_log, remove_log, scan_pending,
};
pub use record::{DecodedRecords, FossilRecord, LOG_VERSION, decode_records};
