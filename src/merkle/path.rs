use serde::{Deserialize, Serialize};

use super::hash::{Hash, hash_leaf, hash_node};

/// Which side of the current node the sibling sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

/// One level of an inclusion path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub direction: Direction,
    pub sibling: Hash,
}

/// Sibling hashes from a leaf up to the root, bottom level first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerklePath(pub Vec<PathStep>);

impl MerklePath {
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Recompute the root reached from raw leaf data
    pub fn root_from(&self, data: &[u8]) -> Hash {
        self.root_from_leaf_hash(hash_leaf(data))
    }

    /// Recompute the root reached from an already-hashed leaf node
    pub fn root_from_leaf_hash(&self, leaf: Hash) -> Hash {
        self.0.iter().fold(leaf, |current, step| match step.direction {
            Direction::Left => hash_node(&step.sibling, &current),
            Direction::Right => hash_node(&current, &step.sibling),
        })
    }

    /// Check that `data` is included under `root` through this path
    pub fn verify(&self, data: &[u8], root: &Hash) -> bool {
        self.root_from(data) == *root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path_is_leaf_hash() {
        let path = MerklePath::default();
        assert_eq!(path.root_from(b"only"), hash_leaf(b"only"));
    }

    #[test]
    fn test_direction_controls_order() {
        let sibling = hash_leaf(b"b");
        let left = MerklePath(vec![PathStep {
            direction: Direction::Left,
            sibling,
        }]);
        let right = MerklePath(vec![PathStep {
            direction: Direction::Right,
            sibling,
        }]);

        let leaf = hash_leaf(b"a");
        assert_eq!(left.root_from(b"a"), hash_node(&sibling, &leaf));
        assert_eq!(right.root_from(b"a"), hash_node(&leaf, &sibling));
    }

    #[test]
    fn test_serialized_shape() {
        let path = MerklePath(vec![PathStep {
            direction: Direction::Right,
            sibling: Hash([0u8; 32]),
        }]);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(
            json,
            format!(r#"[{{"direction":"right","sibling":"{}"}}]"#, "00".repeat(32))
        );
    }
}
