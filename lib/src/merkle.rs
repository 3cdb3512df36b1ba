use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::abi_encoding::keccak256;
use crate::error::MerkleError;
use crate::types::H256;

/// Hash two nodes smaller-first: `keccak256(min(a, b) || max(a, b))`.
pub fn hash_pair(a: &H256, b: &H256) -> H256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo);
    buf[32..].copy_from_slice(hi);
    keccak256(&buf)
}

/// Proof for several leaves at once.
///
/// `flags` holds one entry per hashing step, walking the levels bottom-up and
/// the known nodes of each level left to right: `true` when the sibling is
/// itself known (a requested leaf or a node computed earlier), `false` when it
/// is taken from `proof`. An odd trailing node is promoted without a step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiProof {
    /// Number of leaves in the tree; fixes the shape of every level.
    pub leaf_count: usize,
    /// Sorted, de-duplicated positions of the proven leaves.
    pub indices: Vec<usize>,
    pub proof: Vec<H256>,
    pub flags: Vec<bool>,
}

/// Binary Keccak tree over sorted leaves with sorted-pair hashing.
///
/// Leaves are sorted before the first level is built, so the root depends only
/// on the multiset of leaves. An odd node at the end of a level is carried up
/// unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTree {
    layers: Vec<Vec<H256>>,
}

impl MerkleTree {
    pub fn new(mut leaves: Vec<H256>) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyTree);
        }
        leaves.sort_unstable();

        let mut layers = vec![leaves];
        loop {
            let level = &layers[layers.len() - 1];
            if level.len() == 1 {
                break;
            }
            let next: Vec<H256> = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    _ => pair[0],
                })
                .collect();
            layers.push(next);
        }

        debug!(
            leaves = layers[0].len(),
            depth = layers.len() - 1,
            "built merkle tree"
        );
        Ok(Self { layers })
    }

    pub fn root(&self) -> H256 {
        self.layers[self.layers.len() - 1][0]
    }

    /// Root as `0x` followed by 64 lowercase hex digits.
    pub fn hex_root(&self) -> String {
        format!("0x{}", hex::encode(self.root()))
    }

    /// Leaves in tree order (ascending).
    pub fn leaves(&self) -> &[H256] {
        &self.layers[0]
    }

    pub fn leaf_count(&self) -> usize {
        self.layers[0].len()
    }

    /// Number of hashing levels above the leaves.
    pub fn depth(&self) -> usize {
        self.layers.len() - 1
    }

    /// Position of `leaf` in [`Self::leaves`], if present.
    pub fn index_of(&self, leaf: &H256) -> Option<usize> {
        self.leaves().binary_search(leaf).ok()
    }

    /// Sibling digests from the leaf level up to the root.
    pub fn proof(&self, index: usize) -> Result<Vec<H256>, MerkleError> {
        self.check_index(index)?;

        let mut proof = Vec::with_capacity(self.depth());
        let mut idx = index;
        for level in &self.layers[..self.layers.len() - 1] {
            // No sibling means the node was promoted as is.
            if let Some(sibling) = level.get(idx ^ 1) {
                proof.push(*sibling);
            }
            idx /= 2;
        }
        Ok(proof)
    }

    /// Proof for `proof` in hex form.
    pub fn hex_proof(&self, index: usize) -> Result<Vec<String>, MerkleError> {
        Ok(self
            .proof(index)?
            .iter()
            .map(|node| format!("0x{}", hex::encode(node)))
            .collect())
    }

    /// Build a [`MultiProof`] covering every position in `indices`.
    pub fn multi_proof(&self, indices: &[usize]) -> Result<MultiProof, MerkleError> {
        if indices.is_empty() {
            return Err(MerkleError::EmptyIndices);
        }
        for &index in indices {
            self.check_index(index)?;
        }

        let mut known = indices.to_vec();
        known.sort_unstable();
        known.dedup();
        let sorted = known.clone();

        let mut proof = Vec::new();
        let mut flags = Vec::new();

        for level in &self.layers[..self.layers.len() - 1] {
            let mut next = Vec::with_capacity(known.len());
            let mut i = 0;
            while i < known.len() {
                let idx = known[i];
                let sibling = idx ^ 1;
                if sibling >= level.len() {
                    // promoted
                } else if idx % 2 == 0 && known.get(i + 1) == Some(&sibling) {
                    flags.push(true);
                    i += 1;
                } else {
                    flags.push(false);
                    proof.push(level[sibling]);
                }
                next.push(idx / 2);
                i += 1;
            }
            known = next;
        }

        Ok(MultiProof {
            leaf_count: self.leaf_count(),
            indices: sorted,
            proof,
            flags,
        })
    }

    /// Leaves a verifier needs alongside `multi`, in `multi.indices` order.
    pub fn multi_proof_leaves(&self, multi: &MultiProof) -> Vec<H256> {
        multi
            .indices
            .iter()
            .filter_map(|&index| self.leaves().get(index).copied())
            .collect()
    }

    fn check_index(&self, index: usize) -> Result<(), MerkleError> {
        if index >= self.leaf_count() {
            return Err(MerkleError::IndexOutOfRange {
                index,
                leaf_count: self.leaf_count(),
            });
        }
        Ok(())
    }
}
