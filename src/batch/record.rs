use serde::{Deserialize, Serialize};

use super::error::{BatchError, Result};

/// Version byte written at the start of every batch log
pub const LOG_VERSION: u8 = 1;

const LENGTHS_LEN: usize = 8;
const CRC_LEN: usize = 4;

/// A `(data, meta)` pair submitted for fossilization
///
/// `data` is the leaf value to be proven (usually a content hash); `meta` is
/// opaque to the fossilizer and only travels back with the result so callers
/// can correlate it with their request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FossilRecord {
    pub data: Vec<u8>,
    pub meta: Vec<u8>,
}

impl FossilRecord {
    pub fn new(data: impl Into<Vec<u8>>, meta: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            meta: meta.into(),
        }
    }

    /// Encode one framed record: lengths, payloads, then a CRC32 over all of it
    pub fn encode(&self) -> Result<Vec<u8>> {
        let data_len = frame_len("data", self.data.len())?;
        let meta_len = frame_len("meta", self.meta.len())?;

        let mut buf =
            Vec::with_capacity(LENGTHS_LEN + self.data.len() + self.meta.len() + CRC_LEN);
        buf.extend_from_slice(&data_len.to_be_bytes());
        buf.extend_from_slice(&meta_len.to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf.extend_from_slice(&self.meta);

        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_be_bytes());
        Ok(buf)
    }
}

fn frame_len(field: &'static str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| BatchError::RecordTooLarge { field, len })
}

/// Records recovered from a log body, plus how many trailing bytes were dropped
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodedRecords {
    pub records: Vec<FossilRecord>,
    pub discarded_bytes: usize,
}

/// Decode as many complete records as possible from a log body
///
/// `body` excludes the version byte. Decoding never fails: the first truncated
/// or corrupt record ends the scan and everything from it onwards is counted in
/// `discarded_bytes`.
pub fn decode_records(body: &[u8]) -> DecodedRecords {
    let mut records = Vec::new();
    let mut offset = 0usize;

    while let Some((record, consumed)) = decode_one(&body[offset..]) {
        records.push(record);
        offset += consumed;
    }

    DecodedRecords {
        records,
        discarded_bytes: body.len() - offset,
    }
}

fn decode_one(buf: &[u8]) -> Option<(FossilRecord, usize)> {
    if buf.len() < LENGTHS_LEN {
        return None;
    }

    let data_len = u32::from_be_bytes(buf[0..4].try_into().ok()?) as usize;
    let meta_len = u32::from_be_bytes(buf[4..8].try_into().ok()?) as usize;

    let payload_end = LENGTHS_LEN.checked_add(data_len)?.checked_add(meta_len)?;
    let frame_end = payload_end.checked_add(CRC_LEN)?;
    if buf.len() < frame_end {
        return None;
    }

    let stored_crc = u32::from_be_bytes(buf[payload_end..frame_end].try_into().ok()?);
    if crc32fast::hash(&buf[..payload_end]) != stored_crc {
        return None;
    }

    let data_end = LENGTHS_LEN + data_len;
    let record = FossilRecord {
        data: buf[LENGTHS_LEN..data_end].to_vec(),
        meta: buf[data_end..payload_end].to_vec(),
    };

    Some((record, frame_end))
}
