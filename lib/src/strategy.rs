use alloy_primitives::Address;
use tracing::info;

use crate::abi_encoding::whitelist_leaf;
use crate::error::{MerkleError, StrategyError};
use crate::merkle::{MerkleTree, MultiProof};
use crate::proof::verify_proof;
use crate::row::{parse_rows, to_csv_line, ParseReport, RowGrammar};
use crate::typed_data::TypedData;
use crate::types::{OfferRow, StrategyLeaf, StrategyMetadata, H256};

/// Offer rows of one strategy and the tree committing to them.
///
/// Rows keep their input order; `positions` maps each row to its leaf index in
/// the sorted tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategyTree {
    leaves: Vec<StrategyLeaf>,
    tree: MerkleTree,
    positions: Vec<usize>,
    report: ParseReport,
}

impl StrategyTree {
    pub fn from_csv(text: &str) -> Result<Self, StrategyError> {
        Self::from_csv_with(text, &RowGrammar::default())
    }

    pub fn from_csv_with(text: &str, grammar: &RowGrammar) -> Result<Self, StrategyError> {
        let parsed = parse_rows(text, grammar)?;
        Self::build(parsed.rows, parsed.report)
    }

    pub fn from_rows(rows: Vec<OfferRow>) -> Result<Self, StrategyError> {
        let report = ParseReport {
            accepted: rows.len(),
            dropped: 0,
        };
        Self::build(rows, report)
    }

    fn build(rows: Vec<OfferRow>, report: ParseReport) -> Result<Self, StrategyError> {
        if rows.is_empty() {
            return Err(StrategyError::EmptyStrategy);
        }

        let leaves: Vec<StrategyLeaf> = rows.into_iter().map(StrategyLeaf::new).collect();
        let tree = MerkleTree::new(leaves.iter().map(StrategyLeaf::leaf).collect())?;

        // Stable sort by digest reproduces the tree's leaf order.
        let mut order: Vec<usize> = (0..leaves.len()).collect();
        order.sort_by_key(|&i| leaves[i].leaf());
        let mut positions = vec![0; leaves.len()];
        for (position, &row) in order.iter().enumerate() {
            positions[row] = position;
        }

        info!(rows = leaves.len(), root = %tree.hex_root(), "built strategy tree");
        Ok(Self {
            leaves,
            tree,
            positions,
            report,
        })
    }

    pub fn root(&self) -> H256 {
        self.tree.root()
    }

    pub fn hex_root(&self) -> String {
        self.tree.hex_root()
    }

    /// Leaves in input row order.
    pub fn leaves(&self) -> &[StrategyLeaf] {
        &self.leaves
    }

    pub fn report(&self) -> ParseReport {
        self.report
    }

    pub fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    /// Position of row `row_index` among the tree's sorted leaves.
    pub fn position(&self, row_index: usize) -> Result<usize, MerkleError> {
        self.positions
            .get(row_index)
            .copied()
            .ok_or(MerkleError::IndexOutOfRange {
                index: row_index,
                leaf_count: self.leaves.len(),
            })
    }

    pub fn proof_for_row(&self, row_index: usize) -> Result<Vec<H256>, MerkleError> {
        self.tree.proof(self.position(row_index)?)
    }

    /// Multi-proof for the given rows. The proof's `indices` are tree
    /// positions; use [`MerkleTree::multi_proof_leaves`] for the matching leaves.
    pub fn multi_proof_for_rows(&self, row_indices: &[usize]) -> Result<MultiProof, MerkleError> {
        let positions = row_indices
            .iter()
            .map(|&row| self.position(row))
            .collect::<Result<Vec<_>, _>>()?;
        self.tree.multi_proof(&positions)
    }

    pub fn verify_row(&self, row_index: usize, proof: &[H256]) -> bool {
        self.leaves
            .get(row_index)
            .is_some_and(|leaf| verify_proof(&self.root(), &leaf.leaf(), proof))
    }

    /// Accepted rows rendered back as canonical CSV, one per line.
    pub fn rows_csv(&self) -> String {
        self.leaves
            .iter()
            .map(|leaf| to_csv_line(leaf.row()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Typed data committing this tree's root to `verifying_contract`.
    pub fn typed_data(
        &self,
        metadata: &StrategyMetadata,
        verifying_contract: Address,
        chain_id: u64,
    ) -> TypedData {
        TypedData::new(metadata, self.root(), verifying_contract, chain_id)
    }
}

/// Tree over `keccak256(address)` leaves, used for borrower allow lists.
pub fn whitelist_tree(addresses: &[Address]) -> Result<MerkleTree, MerkleError> {
    MerkleTree::new(addresses.iter().map(whitelist_leaf).collect())
}
