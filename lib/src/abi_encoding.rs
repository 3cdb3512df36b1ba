use alloy_primitives::{Address, U256};
use sha3::{Digest, Keccak256};

use crate::error::EncodingError;
use crate::types::{CollateralOffer, CollectionOffer, LeafType, Lien, OfferRow, H256};

/// Size of one ABI head slot.
pub const WORD: usize = 32;

/// Static ABI types that appear in an offer row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbiField {
    Uint8,
    Address,
    Uint256,
}

/// `(uint8 type, address token, uint256 tokenId, address borrower, uint256 amount, uint256 rate, uint256 duration, uint256 maxPotentialDebt)`
pub const COLLATERAL_LAYOUT: [AbiField; 8] = [
    AbiField::Uint8,
    AbiField::Address,
    AbiField::Uint256,
    AbiField::Address,
    AbiField::Uint256,
    AbiField::Uint256,
    AbiField::Uint256,
    AbiField::Uint256,
];

/// Same as [`COLLATERAL_LAYOUT`] without `tokenId`.
pub const COLLECTION_LAYOUT: [AbiField; 7] = [
    AbiField::Uint8,
    AbiField::Address,
    AbiField::Address,
    AbiField::Uint256,
    AbiField::Uint256,
    AbiField::Uint256,
    AbiField::Uint256,
];

/// Field layout of an encoded row of the given type.
pub fn layout(leaf_type: LeafType) -> &'static [AbiField] {
    match leaf_type {
        LeafType::Collateral => &COLLATERAL_LAYOUT,
        LeafType::Collection => &COLLECTION_LAYOUT,
    }
}

/// A single value in an encoded row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbiValue {
    Uint8(u8),
    Address(Address),
    Uint256(U256),
}

impl AbiValue {
    pub fn field(&self) -> AbiField {
        match self {
            AbiValue::Uint8(_) => AbiField::Uint8,
            AbiValue::Address(_) => AbiField::Address,
            AbiValue::Uint256(_) => AbiField::Uint256,
        }
    }

    /// Big-endian, right-aligned 32-byte slot.
    pub fn word(&self) -> [u8; WORD] {
        let mut word = [0u8; WORD];
        match self {
            AbiValue::Uint8(v) => word[WORD - 1] = *v,
            AbiValue::Address(addr) => word[WORD - 20..].copy_from_slice(addr.as_slice()),
            AbiValue::Uint256(v) => word = v.to_be_bytes::<WORD>(),
        }
        word
    }
}

/// Compute Keccak256 hash
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode a tuple of static values, one word each.
pub fn encode_words(values: &[AbiValue]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(values.len() * WORD);
    for value in values {
        encoded.extend_from_slice(&value.word());
    }
    encoded
}

/// Values of a row in encoding order; matches [`layout`] for the row's type.
pub fn row_values(row: &OfferRow) -> Vec<AbiValue> {
    let mut values = Vec::with_capacity(COLLATERAL_LAYOUT.len());
    values.push(AbiValue::Uint8(row.leaf_type().as_u8()));
    values.push(AbiValue::Address(row.token()));
    if let Some(token_id) = row.token_id() {
        values.push(AbiValue::Uint256(token_id));
    }
    values.push(AbiValue::Address(row.borrower()));

    let lien = row.lien();
    values.extend([
        AbiValue::Uint256(lien.amount),
        AbiValue::Uint256(lien.rate),
        AbiValue::Uint256(lien.duration),
        AbiValue::Uint256(lien.max_potential_debt),
    ]);
    values
}

/// Encode a row exactly as Solidity's `abi.encode` would.
pub fn encode_row(row: &OfferRow) -> Vec<u8> {
    encode_words(&row_values(row))
}

/// Leaf digest of a row: `keccak256(abi.encode(row))`.
pub fn leaf_hash(row: &OfferRow) -> H256 {
    keccak256(&encode_row(row))
}

/// Leaf digest for an address whitelist: `keccak256(address)` over the 20 raw bytes.
pub fn whitelist_leaf(address: &Address) -> H256 {
    keccak256(address.as_slice())
}

/// Decode an ABI-encoded row back into an [`OfferRow`].
pub fn decode_row(data: &[u8]) -> Result<OfferRow, EncodingError> {
    if data.len() < WORD {
        return Err(EncodingError::InvalidLength {
            expected: WORD,
            got: data.len(),
        });
    }

    let type_byte = read_uint8(data, 0)?;
    let leaf_type = LeafType::try_from(type_byte).map_err(EncodingError::UnknownLeafType)?;

    let expected = layout(leaf_type).len() * WORD;
    if data.len() != expected {
        return Err(EncodingError::InvalidLength {
            expected,
            got: data.len(),
        });
    }

    let row = match leaf_type {
        LeafType::Collateral => OfferRow::Collateral(CollateralOffer {
            token: read_address(data, 1)?,
            token_id: read_uint256(data, 2),
            borrower: read_address(data, 3)?,
            lien: read_lien(data, 4),
        }),
        LeafType::Collection => OfferRow::Collection(CollectionOffer {
            token: read_address(data, 1)?,
            borrower: read_address(data, 2)?,
            lien: read_lien(data, 3),
        }),
    };
    Ok(row)
}

fn word_at(data: &[u8], index: usize) -> &[u8] {
    &data[index * WORD..(index + 1) * WORD]
}

fn read_uint8(data: &[u8], index: usize) -> Result<u8, EncodingError> {
    let word = word_at(data, index);
    if word[..WORD - 1].iter().any(|b| *b != 0) {
        return Err(EncodingError::DirtyPadding { word: index });
    }
    Ok(word[WORD - 1])
}

fn read_address(data: &[u8], index: usize) -> Result<Address, EncodingError> {
    let word = word_at(data, index);
    if word[..WORD - 20].iter().any(|b| *b != 0) {
        return Err(EncodingError::DirtyPadding { word: index });
    }
    Ok(Address::from_slice(&word[WORD - 20..]))
}

fn read_uint256(data: &[u8], index: usize) -> U256 {
    U256::from_be_slice(word_at(data, index))
}

fn read_lien(data: &[u8], first: usize) -> Lien {
    Lien {
        amount: read_uint256(data, first),
        rate: read_uint256(data, first + 1),
        duration: read_uint256(data, first + 2),
        max_potential_debt: read_uint256(data, first + 3),
    }
}
