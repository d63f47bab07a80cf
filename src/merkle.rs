use blake3::Hasher;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MerkleError {
    #[error("cannot build a tree over zero leaves")]
    EmptyLeaves,
    #[error("leaf index {index} out of range for {len} leaves")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("leaf is not valid hex: {0}")]
    InvalidHex(String),
}

/// Which side a proof sibling sits on relative to the running node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: String,
    pub position: Position,
}

/// Binary blake3 hash tree. Level 0 holds the leaf digests; each higher
/// level hashes adjacent pairs (an odd node is paired with itself) until
/// one root remains. Immutable once built.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<String>>,
}

impl MerkleTree {
    /// Build a tree over hex leaf digests. An empty list is rejected
    /// rather than yielding a sentinel root.
    pub fn build(leaves: &[String]) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyLeaves);
        }
        for l in leaves {
            if hex::decode(l).is_err() {
                return Err(MerkleError::InvalidHex(l.clone()));
            }
        }
        let mut levels = vec![leaves.to_vec()];
        while levels.last().map_or(0, Vec::len) > 1 {
            let layer = levels.last().map(Vec::as_slice).unwrap_or_default();
            let mut next = Vec::with_capacity(layer.len().div_ceil(2));
            for chunk in layer.chunks(2) {
                let left = &chunk[0];
                let right = chunk.get(1).unwrap_or(&chunk[0]);
                next.push(hash_pair(left, right));
            }
            levels.push(next);
        }
        Ok(Self { levels })
    }

    #[must_use]
    pub fn root(&self) -> &str {
        // levels is never empty and the top level holds exactly one node
        &self.levels[self.levels.len() - 1][0]
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Collect the sibling path for one leaf, bottom-up. Each step records
    /// the sibling digest and whether it sits left or right of the running
    /// node; the index halves per level.
    pub fn proof(&self, leaf_index: usize) -> Result<Vec<ProofStep>, MerkleError> {
        let len = self.leaf_count();
        if leaf_index >= len {
            return Err(MerkleError::IndexOutOfRange {
                index: leaf_index,
                len,
            });
        }
        let mut steps = Vec::with_capacity(self.levels.len() - 1);
        let mut index = leaf_index;
        for level in &self.levels[..self.levels.len() - 1] {
            let (sibling_index, position) = if index % 2 == 0 {
                (index + 1, Position::Right)
            } else {
                (index - 1, Position::Left)
            };
            // odd level end: the node was paired with itself
            let sibling = level.get(sibling_index).unwrap_or(&level[index]);
            steps.push(ProofStep {
                sibling: sibling.clone(),
                position,
            });
            index /= 2;
        }
        Ok(steps)
    }
}

/// Fold a proof from a leaf digest up to a root and compare.
#[must_use]
pub fn verify_proof(leaf: &str, proof: &[ProofStep], root: &str) -> bool {
    let mut cur = leaf.to_string();
    for step in proof {
        cur = match step.position {
            Position::Left => hash_pair(&step.sibling, &cur),
            Position::Right => hash_pair(&cur, &step.sibling),
        };
    }
    cur == root
}

/// blake3 hex digest of raw bytes; how leaves are derived from content.
#[must_use]
pub fn leaf_hex(data: &[u8]) -> String {
    let mut h = Hasher::new();
    h.update(data);
    hex::encode(h.finalize().as_bytes())
}

fn hash_pair(left_hex: &str, right_hex: &str) -> String {
    let mut bytes = Vec::with_capacity(left_hex.len() / 2 + right_hex.len() / 2);
    // hex validity is checked at build; a bad step hash folds to a miss
    bytes.extend(hex::decode(left_hex).unwrap_or_default());
    bytes.extend(hex::decode(right_hex).unwrap_or_default());
    let mut h = Hasher::new();
    h.update(&bytes);
    hex::encode(h.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<String> {
        (0..n).map(|i| leaf_hex(format!("leaf-{i}").as_bytes())).collect()
    }

    #[test]
    fn empty_build_is_rejected() {
        assert_eq!(MerkleTree::build(&[]).unwrap_err(), MerkleError::EmptyLeaves);
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let ls = leaves(1);
        let tree = MerkleTree::build(&ls).unwrap();
        assert_eq!(tree.root(), ls[0]);
        assert!(tree.proof(0).unwrap().is_empty());
    }

    #[test]
    fn level_count_matches_leaf_count() {
        for (n, expect) in [(1, 1), (2, 2), (3, 3), (4, 3), (5, 4), (8, 4), (9, 5)] {
            let tree = MerkleTree::build(&leaves(n)).unwrap();
            assert_eq!(tree.levels.len(), expect, "n={n}");
        }
    }

    #[test]
    fn odd_layer_duplicates_last_node() {
        let ls = leaves(3);
        let tree = MerkleTree::build(&ls).unwrap();
        let dup = hash_pair(&ls[2], &ls[2]);
        assert_eq!(tree.levels[1][1], dup);
    }

    #[test]
    fn proof_out_of_range_is_an_error() {
        let tree = MerkleTree::build(&leaves(4)).unwrap();
        assert_eq!(
            tree.proof(4).unwrap_err(),
            MerkleError::IndexOutOfRange { index: 4, len: 4 }
        );
    }

    #[test]
    fn non_hex_leaf_is_rejected() {
        let err = MerkleTree::build(&["zz".to_string()]).unwrap_err();
        assert!(matches!(err, MerkleError::InvalidHex(_)));
    }
}
