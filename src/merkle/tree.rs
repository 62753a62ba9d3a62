use super::hash::{Hash, hash_leaf, hash_node};
use super::path::{Direction, MerklePath, PathStep};
use super::{MerkleError, Result};

/// A fully materialised Merkle tree
///
/// `levels[0]` holds the leaf hashes, the last level holds only the root.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build a tree over `leaves` in the given order
    pub fn build<I, T>(leaves: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let bottom: Vec<Hash> = leaves
            .into_iter()
            .map(|leaf| hash_leaf(leaf.as_ref()))
            .collect();
        if bottom.is_empty() {
            return Err(MerkleError::Empty);
        }

        let mut levels = vec![bottom];
        while let Some(current) = levels.last().filter(|level| level.len() > 1) {
            let next = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_node(left, right),
                    // Odd node out is promoted as-is
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
            levels.push(next);
        }

        Ok(Self { levels })
    }

    pub fn root(&self) -> Hash {
        // Non-empty by construction
        self.levels[self.levels.len() - 1][0]
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Number of levels including the leaves and the root
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn leaf(&self, index: usize) -> Option<Hash> {
        self.levels[0].get(index).copied()
    }

    /// Inclusion path for a single leaf
    pub fn path(&self, index: usize) -> Result<MerklePath> {
        if index >= self.leaf_count() {
            return Err(MerkleError::IndexOutOfRange {
                index,
                leaves: self.leaf_count(),
            });
        }

        let mut steps = Vec::with_capacity(self.depth());
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            if let Some(step) = step_at(level, position) {
                steps.push(step);
            }
            position /= 2;
        }
        Ok(MerklePath(steps))
    }

    /// Inclusion paths for every leaf, in leaf order
    ///
    /// Walks each level once and extends all paths together instead of
    /// re-walking the tree per leaf.
    pub fn paths(&self) -> Vec<MerklePath> {
        let mut paths = vec![Vec::with_capacity(self.depth()); self.leaf_count()];

        for (height, level) in self.levels[..self.levels.len() - 1].iter().enumerate() {
            for (leaf, steps) in paths.iter_mut().enumerate() {
                if let Some(step) = step_at(level, leaf >> height) {
                    steps.push(step);
                }
            }
        }

        paths.into_iter().map(MerklePath).collect()
    }
}

fn step_at(level: &[Hash], position: usize) -> Option<PathStep> {
    if position % 2 == 0 {
        level.get(position + 1).map(|sibling| PathStep {
            direction: Direction::Right,
            sibling: *sibling,
        })
    } else {
        Some(PathStep {
            direction: Direction::Left,
            sibling: level[position - 1],
        })
    }
}
