use thiserror::Error;

use super::models::FossilRequest;

/// Largest accepted leaf value; content hashes are far below this
pub const MAX_DATA_BYTES: usize = 1024;

pub const MAX_META_BYTES: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum FossilValidationError {
    #[error("data must not be empty")]
    EmptyData,
    #[error("data must be hex encoded: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("data is {0} bytes, limit is {}", MAX_DATA_BYTES)]
    DataTooLarge(usize),
    #[error("meta is {0} bytes, limit is {}", MAX_META_BYTES)]
    MetaTooLarge(usize),
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidFossil {
    pub data: Vec<u8>,
    pub meta: Vec<u8>,
}

pub fn validate_request(request: &FossilRequest) -> Result<ValidFossil, FossilValidationError> {
    let data = decode_data(&request.data)?;

    if request.meta.len() > MAX_META_BYTES {
        return Err(FossilValidationError::MetaTooLarge(request.meta.len()));
    }

    Ok(ValidFossil {
        data,
        meta: request.meta.clone().into_bytes(),
    })
}

/// Decode a hex leaf value, as sent in bodies and in `/results/{data}`
pub fn decode_data(hex_data: &str) -> Result<Vec<u8>, FossilValidationError> {
    let trimmed = hex_data.trim();
    if trimmed.is_empty() {
        return Err(FossilValidationError::EmptyData);
    }

    let data = hex::decode(trimmed)?;
    if data.len() > MAX_DATA_BYTES {
        return Err(FossilValidationError::DataTooLarge(data.len()));
    }
    Ok(data)
}
