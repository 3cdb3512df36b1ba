use alloy_primitives::{Bytes, B256};
use alloy_sol_types::SolValue;

use crate::merkle::{hash_pair, MultiProof};
use crate::signature::StrategySignature;
use crate::types::H256;

/// Verify a single-leaf proof produced by [`crate::merkle::MerkleTree::proof`].
///
/// Siblings are folded in with the sorted-pair rule, so no direction bits are needed.
pub fn verify_proof(root: &H256, leaf: &H256, proof: &[H256]) -> bool {
    proof
        .iter()
        .fold(*leaf, |node, sibling| hash_pair(&node, sibling))
        == *root
}

/// Verify that `leaves` belong to the tree committed to by `root` with the shape `multi` describes.
///
/// `leaves` must be given in `multi.indices` order. Since pairs hash in
/// sorted order, a multi-proof binds the set of leaves and the tree shape,
/// not the exact positions: swapping a leaf with its sibling's index still
/// verifies.
///
/// The level walk of
/// [`crate::merkle::MerkleTree::multi_proof`] is replayed; every flag has to
/// agree with the tree shape and both `proof` and `flags` must be consumed
/// exactly.
pub fn verify_multi_proof(root: &H256, multi: &MultiProof, leaves: &[H256]) -> bool {
    if multi.indices.is_empty() || multi.indices.len() != leaves.len() {
        return false;
    }
    if multi.indices.windows(2).any(|pair| pair[0] >= pair[1]) {
        return false;
    }
    if multi
        .indices
        .last()
        .map_or(true, |last| *last >= multi.leaf_count)
    {
        return false;
    }

    let mut known: Vec<(usize, H256)> = multi
        .indices
        .iter()
        .copied()
        .zip(leaves.iter().copied())
        .collect();
    let mut proof = multi.proof.iter();
    let mut flags = multi.flags.iter();
    let mut width = multi.leaf_count;

    while width > 1 {
        let mut next = Vec::with_capacity(known.len());
        let mut i = 0;
        while i < known.len() {
            let (idx, node) = known[i];
            let sibling = idx ^ 1;
            if sibling >= width {
                next.push((idx / 2, node));
                i += 1;
                continue;
            }

            let paired = idx % 2 == 0 && known.get(i + 1).map(|(j, _)| *j) == Some(sibling);
            match flags.next() {
                Some(flag) if *flag == paired => {}
                _ => return false,
            }

            let other = if paired {
                i += 1;
                known[i].1
            } else {
                match proof.next() {
                    Some(node) => *node,
                    None => return false,
                }
            };
            next.push((idx / 2, hash_pair(&node, &other)));
            i += 1;
        }
        known = next;
        width = width.div_ceil(2);
    }

    proof.next().is_none() && flags.next().is_none() && known.len() == 1 && known[0].1 == *root
}

/// `abi.encode(bytes32 root, bytes32[] proof)`.
pub fn abi_encode_root_proof(root: &H256, proof: &[H256]) -> Vec<u8> {
    (B256::from(*root), to_b256(proof)).abi_encode_params()
}

/// `abi.encode(bytes32 root, bytes32[] proof, bytes signature)` with the
/// 65-byte `r || s || v` signature, as consumed by the vault at loan origination.
pub fn abi_encode_loan_proof(root: &H256, proof: &[H256], signature: &StrategySignature) -> Vec<u8> {
    (
        B256::from(*root),
        to_b256(proof),
        Bytes::from(signature.to_bytes().to_vec()),
    )
        .abi_encode_params()
}

fn to_b256(nodes: &[H256]) -> Vec<B256> {
    nodes.iter().copied().map(B256::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi_encoding::keccak256;
    use crate::merkle::MerkleTree;

    fn tree(count: u8) -> MerkleTree {
        MerkleTree::new((0..count).map(|n| keccak256(&[n])).collect()).unwrap()
    }

    #[test]
    fn test_verify_every_leaf() {
        for count in 1..=9 {
            let tree = tree(count);
            for (i, leaf) in tree.leaves().iter().enumerate() {
                let proof = tree.proof(i).unwrap();
                assert!(verify_proof(&tree.root(), leaf, &proof), "{count} leaves, index {i}");
            }
        }
    }

    #[test]
    fn test_verify_rejects_absent_leaf() {
        let tree = tree(6);
        let proof = tree.proof(2).unwrap();
        assert!(!verify_proof(&tree.root(), &keccak256(b"absent"), &proof));
    }

    #[test]
    fn test_verify_rejects_truncated_proof() {
        let tree = tree(6);
        let mut proof = tree.proof(1).unwrap();
        proof.pop();
        assert!(!verify_proof(&tree.root(), &tree.leaves()[1], &proof));
    }

    #[test]
    fn test_verify_multi_proof_subsets() {
        for count in 1..=9u8 {
            let tree = tree(count);
            let n = count as usize;
            // every subset of up to 9 leaves
            for mask in 1u32..(1 << n) {
                let indices: Vec<usize> = (0..n).filter(|i| mask & (1 << i) != 0).collect();
                let multi = tree.multi_proof(&indices).unwrap();
                let leaves = tree.multi_proof_leaves(&multi);
                assert!(
                    verify_multi_proof(&tree.root(), &multi, &leaves),
                    "{count} leaves, indices {indices:?}"
                );
            }
        }
    }

    #[test]
    fn test_multi_proof_rejects_other_subset() {
        let tree = tree(8);
        let multi = tree.multi_proof(&[0, 2]).unwrap();
        let other = vec![tree.leaves()[1], tree.leaves()[3]];
        assert!(!verify_multi_proof(&tree.root(), &multi, &other));

        let outside = vec![tree.leaves()[0], keccak256(b"not a leaf")];
        assert!(!verify_multi_proof(&tree.root(), &multi, &outside));
    }

    #[test]
    fn test_multi_proof_binds_leaf_set() {
        // Pairs hash in sorted order, so sibling positions are interchangeable.
        let tree = tree(8);
        let multi = tree.multi_proof(&[0, 2]).unwrap();
        let leaves = tree.multi_proof_leaves(&multi);

        let mut moved = multi.clone();
        moved.indices = vec![1, 3];
        assert!(verify_multi_proof(&tree.root(), &moved, &leaves));
    }

    #[test]
    fn test_multi_proof_rejects_tampering() {
        let tree = tree(7);
        let multi = tree.multi_proof(&[1, 4]).unwrap();
        let leaves = tree.multi_proof_leaves(&multi);
        assert!(verify_multi_proof(&tree.root(), &multi, &leaves));

        let mut flipped = multi.clone();
        flipped.flags[0] = !flipped.flags[0];
        assert!(!verify_multi_proof(&tree.root(), &flipped, &leaves));

        let mut extra = multi.clone();
        extra.proof.push([0u8; 32]);
        assert!(!verify_multi_proof(&tree.root(), &extra, &leaves));

        let mut short = multi.clone();
        short.proof.pop();
        assert!(!verify_multi_proof(&tree.root(), &short, &leaves));

        assert!(!verify_multi_proof(&tree.root(), &multi, &leaves[..1]));
    }

    #[test]
    fn test_multi_proof_rejects_other_shape() {
        let tree = tree(7);
        let multi = tree.multi_proof(&[1, 4]).unwrap();
        let leaves = tree.multi_proof_leaves(&multi);

        // With five leaves, index 4 is promoted instead of paired with 5.
        let mut promoted = multi.clone();
        promoted.leaf_count = 5;
        assert!(!verify_multi_proof(&tree.root(), &promoted, &leaves));

        // Sixteen leaves add a level the flags do not cover.
        let mut deeper = multi.clone();
        deeper.leaf_count = 16;
        assert!(!verify_multi_proof(&tree.root(), &deeper, &leaves));

        let mut narrow = multi.clone();
        narrow.leaf_count = 2;
        assert!(!verify_multi_proof(&tree.root(), &narrow, &leaves));
    }

    #[test]
    fn test_abi_encode_root_proof_layout() {
        let tree = tree(4);
        let proof = tree.proof(0).unwrap();
        let encoded = abi_encode_root_proof(&tree.root(), &proof);

        // root, offset, length, two siblings
        assert_eq!(encoded.len(), 32 * 5);
        assert_eq!(&encoded[..32], &tree.root());
        assert_eq!(encoded[63], 0x40);
        assert_eq!(encoded[95], 2);
        assert_eq!(&encoded[96..128], &proof[0]);
        assert_eq!(&encoded[128..160], &proof[1]);
    }
}
