use thiserror::Error;

/// Why a single CSV row was rejected.
///
/// Rejected rows are filtered out by [`crate::row::parse_rows`] and only show
/// up in its [`crate::row::ParseReport`]; call [`crate::row::parse_row`] to see
/// the reason for one line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("row is empty")]
    Empty,
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("unknown leaf type `{0}`")]
    UnknownType(String),
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    #[error("invalid {field} `{value}`")]
    InvalidNumber { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("expected {expected} bytes of encoded row, got {got}")]
    InvalidLength { expected: usize, got: usize },
    #[error("unknown leaf type {0}")]
    UnknownLeafType(u8),
    #[error("non-zero padding in word {word}")]
    DirtyPadding { word: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("cannot build a tree without leaves")]
    EmptyTree,
    #[error("leaf index {index} out of range for {leaf_count} leaves")]
    IndexOutOfRange { index: usize, leaf_count: usize },
    #[error("multi-proof requested for no leaves")]
    EmptyIndices,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    #[error("strategy did not contain any valid rows")]
    EmptyStrategy,
    #[error(transparent)]
    Tree(#[from] MerkleError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("no signer or private key available")]
    SigningUnavailable,
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("remote signer failed: {0}")]
    Remote(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed strategy payload: {0}")]
    MalformedPayload(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::MalformedPayload(err.to_string())
    }
}
