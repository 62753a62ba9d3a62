use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::Result;
use super::proof::{BatchProof, Evidence, FossilResult};
use crate::batch::FossilRecord;
use crate::merkle::{Hash, MerkleTree};

/// Error returned by a [`Transformer`]
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransformError(pub String);

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Post-processing hook applied to every result before it is emitted
///
/// Receives the batch evidence plus the original data and meta, returns the
/// result to publish. Outer layers (for example one that re-anchors the root
/// elsewhere) use it to augment evidence without touching the engine.
pub type Transformer =
    Arc<dyn Fn(Evidence, &[u8], &[u8]) -> std::result::Result<FossilResult, TransformError> + Send + Sync>;

/// Output of sealing one batch
#[derive(Debug, Clone)]
pub struct SealedBatch {
    pub root: Hash,
    pub timestamp: i64,
    pub results: Vec<FossilResult>,
}

/// Wraps Merkle paths into versioned evidence
#[derive(Clone)]
pub struct EvidenceBuilder {
    provider: String,
    transformer: Option<Transformer>,
}

impl EvidenceBuilder {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            transformer: None,
        }
    }

    pub fn with_transformer(mut self, transformer: Option<Transformer>) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Build the tree over `leaves` and one result per leaf, in leaf order
    ///
    /// Any transformer failure fails the whole batch so that no partial set of
    /// results is ever published.
    pub fn seal(&self, leaves: &[FossilRecord], timestamp: i64) -> Result<SealedBatch> {
        let tree = MerkleTree::build(leaves.iter().map(|record| &record.data))?;
        let root = tree.root();

        let results = leaves
            .iter()
            .zip(tree.paths())
            .map(|(record, merkle_path)| {
                let evidence = Evidence::new(
                    self.provider.clone(),
                    BatchProof {
                        merkle_path,
                        merkle_root: root,
                        timestamp,
                    },
                );
                self.finish(evidence, record)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SealedBatch {
            root,
            timestamp,
            results,
        })
    }

    fn finish(&self, evidence: Evidence, record: &FossilRecord) -> Result<FossilResult> {
        match &self.transformer {
            Some(transform) => Ok(transform(evidence, record.data.as_slice(), record.meta.as_slice())?),
            None => Ok(FossilResult {
                evidence,
                data: record.data.clone(),
                meta: record.meta.clone(),
            }),
        }
    }
}

impl fmt::Debug for EvidenceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvidenceBuilder")
            .field("provider", &self.provider)
            .field("transformer", &self.transformer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceError;

    fn records(n: usize) -> Vec<FossilRecord> {
        (0..n)
            .map(|i| FossilRecord::new(format!("data {}", i), format!("meta {}", i)))
            .collect()
    }

    #[test]
    fn test_seal_builds_one_result_per_leaf() {
        let leaves = records(5);
        let sealed = EvidenceBuilder::new("unit").seal(&leaves, 1234).unwrap();

        assert_eq!(sealed.results.len(), 5);
        assert_eq!(sealed.timestamp, 1234);
        for (result, record) in sealed.results.iter().zip(&leaves) {
            assert_eq!(result.data, record.data);
            assert_eq!(result.meta, record.meta);
            assert_eq!(result.evidence.proof.merkle_root, sealed.root);
            assert_eq!(result.evidence.time(), 1234);
            assert!(result.evidence.verify(&record.data));
        }
    }

    #[test]
    fn test_seal_empty_batch_fails() {
        let result = EvidenceBuilder::new("unit").seal(&[], 0);
        assert!(matches!(result, Err(EvidenceError::Merkle(_))));
    }

    #[test]
    fn test_transformer_is_applied() {
        let transformer: Transformer = Arc::new(
            |mut evidence: Evidence, data: &[u8], _meta: &[u8]| -> std::result::Result<
                FossilResult,
                TransformError,
            > {
                evidence.provider = "anchored".to_string();
                Ok(FossilResult {
                    evidence,
                    data: data.to_vec(),
                    meta: b"rewritten".to_vec(),
                })
            },
        );

        let sealed = EvidenceBuilder::new("unit")
            .with_transformer(Some(transformer))
            .seal(&records(2), 1)
            .unwrap();

        assert!(sealed.results.iter().all(|r| r.evidence.provider == "anchored"));
        assert!(sealed.results.iter().all(|r| r.meta == b"rewritten"));
    }

    #[test]
    fn test_transformer_error_fails_batch() {
        let transformer: Transformer = Arc::new(
            |evidence: Evidence, data: &[u8], meta: &[u8]| -> std::result::Result<
                FossilResult,
                TransformError,
            > {
                if data == b"data 1" {
                    return Err(TransformError::new("anchor unavailable"));
                }
                Ok(FossilResult {
                    evidence,
                    data: data.to_vec(),
                    meta: meta.to_vec(),
                })
            },
        );

        let result = EvidenceBuilder::new("unit")
            .with_transformer(Some(transformer))
            .seal(&records(3), 1);
        assert!(matches!(result, Err(EvidenceError::Transform(_))));
    }
}
