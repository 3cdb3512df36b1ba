use alloy_sol_types::sol;

pub mod abi_encoding;
pub mod codec;
pub mod error;
pub mod merkle;
pub mod proof;
pub mod row;
pub mod signature;
pub mod strategy;
pub mod typed_data;
pub mod types;

#[cfg(feature = "std")]
pub mod signer;

pub use abi_encoding::{decode_row, encode_row, keccak256, leaf_hash, whitelist_leaf};
pub use codec::{decode_bundle, encode_bundle, SignedStrategyBundle};
pub use error::*;
pub use merkle::{hash_pair, MerkleTree, MultiProof};
pub use proof::*;
pub use row::{parse_row, parse_rows, ParseReport, ParsedRows, RowGrammar};
pub use signature::StrategySignature;
pub use strategy::{whitelist_tree, StrategyTree};
pub use typed_data::TypedData;
pub use types::*;

#[cfg(feature = "std")]
pub use signer::*;

sol! {
    /// Primary EIP-712 type a strategist signs for every root.
    struct StrategyDetails {
        uint256 nonce;
        uint256 deadline;
        bytes32 root;
    }
}
