use alloy_primitives::{Address, U256};

use crate::abi_encoding::leaf_hash;

/// 32-byte hash type
pub type H256 = [u8; 32];

/// Leaf format discriminant, written as the leading `uint8` word of every encoded row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LeafType {
    /// A loan offer against one specific token.
    Collateral = 1,
    /// A loan offer against any token of a collection.
    Collection = 2,
}

impl LeafType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for LeafType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(LeafType::Collateral),
            2 => Ok(LeafType::Collection),
            other => Err(other),
        }
    }
}

/// Lien terms carried by every offer.
///
/// `Lien` is never encoded on its own, it is always flattened into the
/// enclosing offer after the borrower word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Lien {
    /// Amount of the borrowed asset, in wei.
    pub amount: U256,
    /// Interest accrued per second, scaled by 10**18.
    pub rate: U256,
    /// Maximum life of the lien in seconds.
    pub duration: U256,
    /// Upper bound on the debt of all liens senior to this one. Zero means most senior.
    pub max_potential_debt: U256,
}

/// Offer bound to one token of a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollateralOffer {
    pub token: Address,
    pub token_id: U256,
    /// `Address::ZERO` lets any borrower commit to the lien.
    pub borrower: Address,
    pub lien: Lien,
}

/// Offer valid for any token of a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectionOffer {
    pub token: Address,
    pub borrower: Address,
    pub lien: Lien,
}

/// One row of a lending strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OfferRow {
    Collateral(CollateralOffer),
    Collection(CollectionOffer),
}

impl OfferRow {
    pub fn leaf_type(&self) -> LeafType {
        match self {
            OfferRow::Collateral(_) => LeafType::Collateral,
            OfferRow::Collection(_) => LeafType::Collection,
        }
    }

    pub fn token(&self) -> Address {
        match self {
            OfferRow::Collateral(offer) => offer.token,
            OfferRow::Collection(offer) => offer.token,
        }
    }

    /// Token id for collateral offers, `None` for collection offers.
    pub fn token_id(&self) -> Option<U256> {
        match self {
            OfferRow::Collateral(offer) => Some(offer.token_id),
            OfferRow::Collection(_) => None,
        }
    }

    pub fn borrower(&self) -> Address {
        match self {
            OfferRow::Collateral(offer) => offer.borrower,
            OfferRow::Collection(offer) => offer.borrower,
        }
    }

    pub fn lien(&self) -> &Lien {
        match self {
            OfferRow::Collateral(offer) => &offer.lien,
            OfferRow::Collection(offer) => &offer.lien,
        }
    }
}

impl From<CollateralOffer> for OfferRow {
    fn from(offer: CollateralOffer) -> Self {
        OfferRow::Collateral(offer)
    }
}

impl From<CollectionOffer> for OfferRow {
    fn from(offer: CollectionOffer) -> Self {
        OfferRow::Collection(offer)
    }
}

/// An offer row together with its leaf digest.
///
/// The digest is computed once in [`StrategyLeaf::new`]; there is no way to
/// change the row or the digest afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrategyLeaf {
    row: OfferRow,
    leaf: H256,
}

impl StrategyLeaf {
    pub fn new(row: OfferRow) -> Self {
        let leaf = leaf_hash(&row);
        Self { row, leaf }
    }

    pub fn row(&self) -> &OfferRow {
        &self.row
    }

    pub fn leaf(&self) -> H256 {
        self.leaf
    }

    pub fn hex_leaf(&self) -> String {
        format!("0x{}", hex::encode(self.leaf))
    }
}

impl From<OfferRow> for StrategyLeaf {
    fn from(row: OfferRow) -> Self {
        StrategyLeaf::new(row)
    }
}

/// Vault-level settings a strategist signs alongside a root.
///
/// Only `version`, `nonce`, `expiration` and the vault end up in the signed
/// payload; the rest describes the vault for tooling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategyMetadata {
    /// Strategy format version.
    pub version: u8,
    /// EOA of the strategist opening the vault.
    pub strategist: Address,
    /// EOA allowed to sign new roots after the vault is opened.
    pub delegate: Option<Address>,
    /// Whether the vault is public. Fixed at vault opening.
    pub public: Option<bool>,
    /// Timestamp after which the strategy is no longer valid.
    pub expiration: U256,
    /// On-chain nonce; bumping it invalidates every lower strategy.
    pub nonce: U256,
    /// Vault contract. `Address::ZERO` when the tree opens a new vault.
    pub vault: Address,
}
