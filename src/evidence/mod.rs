//! Evidence builder
//!
//! Turns a sealed batch into one portable [`Evidence`] per leaf. Each evidence
//! carries a [`BatchProof`] (seal timestamp, Merkle root, the leaf's path) in
//! canonical JSON form so any implementation can re-verify it byte for byte.

mod builder;
mod proof;

pub use builder::{EvidenceBuilder, SealedBatch, TransformError, Transformer};
pub use proof::{BatchProof, Evidence, FossilResult};

use thiserror::Error;

use crate::merkle::MerkleError;

/// Evidence format version
pub const EVIDENCE_VERSION: &str = "1.0.0";

/// Backend name carried by every batch evidence
pub const BACKEND: &str = "batch";

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("Merkle error: {0}")]
    Merkle(#[from] MerkleError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transformer failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Unsupported evidence backend: {0}")]
    UnsupportedBackend(String),
}

pub type Result<T> = std::result::Result<T, EvidenceError>;
