//! Merkle engine
//!
//! Builds a binary BLAKE3 Merkle tree over the ordered leaves of a sealed
//! batch and produces one inclusion path per leaf.
//!
//! Hashing rules (stable; changing any of them changes every root):
//! - leaf node: `H(0x00 || data)`
//! - interior node: `H(0x01 || left || right)`
//! - a level with an odd node count promotes its last node unchanged to the
//!   next level; the paths through that node record no step for that level
//!
//! The same ordered leaf sequence always yields the same root and paths, which
//! is what lets a batch replayed from its log reproduce the evidence a live
//! seal would have produced.

mod hash;
mod path;
mod tree;

pub use hash::{Hash, HashParseError, hash_leaf, hash_node};
pub use path::{Direction, MerklePath, PathStep};
pub use tree::MerkleTree;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MerkleError {
    #[error("cannot build a Merkle tree without leaves")]
    Empty,

    #[error("leaf index {index} out of range for {leaves} leaves")]
    IndexOutOfRange { index: usize, leaves: usize },
}

pub type Result<T> = std::result::Result<T, MerkleError>;
