use serde::{Deserialize, Serialize};

use super::{BACKEND, EVIDENCE_VERSION, EvidenceError, Result};
use crate::merkle::{Hash, MerklePath};

/// Inclusion proof of one leaf in a sealed batch
///
/// Fields are declared in key order so `serde_json` output is already
/// canonical: sorted keys, no whitespace, hashes as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProof {
    pub merkle_path: MerklePath,
    pub merkle_root: Hash,
    pub timestamp: i64,
}

impl BatchProof {
    /// Canonical byte encoding of the proof
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Seal time, unix seconds
    pub fn time(&self) -> i64 {
        self.timestamp
    }

    /// Check that `leaf` hashes up to the stored root through the stored path
    pub fn verify(&self, leaf: &[u8]) -> bool {
        self.merkle_path.verify(leaf, &self.merkle_root)
    }
}

/// Portable fossilization evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub backend: String,
    pub proof: BatchProof,
    pub provider: String,
    pub version: String,
}

impl Evidence {
    pub fn new(provider: impl Into<String>, proof: BatchProof) -> Self {
        Self {
            backend: BACKEND.to_string(),
            proof,
            provider: provider.into(),
            version: EVIDENCE_VERSION.to_string(),
        }
    }

    pub fn time(&self) -> i64 {
        self.proof.time()
    }

    /// Verify that `leaf` is included in the batch this evidence was issued for
    ///
    /// Unlike a purely structural check this binds the evidence to `leaf`: a
    /// valid path for a different leaf returns `false`.
    pub fn verify(&self, leaf: &[u8]) -> bool {
        self.backend == BACKEND && self.proof.verify(leaf)
    }

    pub fn to_canonical_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let evidence: Evidence = serde_json::from_slice(bytes)?;
        if evidence.backend != BACKEND {
            return Err(EvidenceError::UnsupportedBackend(evidence.backend));
        }
        Ok(evidence)
    }
}

/// Evidence for one fossilized record, correlated with the original request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FossilResult {
    pub evidence: Evidence,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub meta: Vec<u8>,
}
