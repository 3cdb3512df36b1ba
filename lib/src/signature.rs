use alloy_primitives::{Address, U256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use crate::abi_encoding::keccak256;
use crate::error::SignerError;
use crate::typed_data::TypedData;
use crate::types::H256;

const SECP256K1_ORDER: [u8; 32] =
    alloy_primitives::hex!("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141");

/// secp256k1 signature over a strategy's typed-data hash.
///
/// `v` is always 27 or 28 and `s` is always in the lower half of the curve
/// order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrategySignature {
    r: H256,
    s: H256,
    v: u8,
}

impl StrategySignature {
    /// Accepts `v` as a recovery id (0/1) or in Ethereum form (27/28).
    ///
    /// A high `s` is replaced by `n - s` with the parity flipped, which
    /// recovers the same key.
    pub fn new(r: H256, s: H256, v: u8) -> Result<Self, SignerError> {
        let v = match v {
            0 | 1 => v + 27,
            27 | 28 => v,
            other => {
                return Err(SignerError::InvalidSignature(format!(
                    "invalid recovery byte {other}"
                )))
            }
        };

        let order = U256::from_be_bytes(SECP256K1_ORDER);
        let value = U256::from_be_bytes(s);
        if value >= order {
            return Err(SignerError::InvalidSignature(
                "s is not below the curve order".to_string(),
            ));
        }
        if value > order >> 1 {
            let low = (order - value).to_be_bytes::<32>();
            return Ok(Self { r, s: low, v: 55 - v });
        }
        Ok(Self { r, s, v })
    }

    /// Split a 65-byte `r || s || v` signature.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignerError> {
        if bytes.len() != 65 {
            return Err(SignerError::InvalidSignature(format!(
                "expected 65 bytes, got {}",
                bytes.len()
            )));
        }
        let (r, s) = split_words(&bytes[..64]);
        Self::new(r, s, bytes[64])
    }

    /// Parse an EIP-2098 `r || yParityAndS` signature.
    pub fn from_compact(bytes: &[u8]) -> Result<Self, SignerError> {
        if bytes.len() != 64 {
            return Err(SignerError::InvalidSignature(format!(
                "expected 64 bytes, got {}",
                bytes.len()
            )));
        }
        let (r, mut s) = split_words(bytes);
        let parity = s[0] >> 7;
        s[0] &= 0x7f;
        Self::new(r, s, parity)
    }

    pub fn r(&self) -> H256 {
        self.r
    }

    pub fn s(&self) -> H256 {
        self.s
    }

    pub fn v(&self) -> u8 {
        self.v
    }

    pub fn y_parity(&self) -> u8 {
        self.v - 27
    }

    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    /// EIP-2098 form: `r || (s | yParity << 255)`.
    pub fn compact(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out[32] |= self.y_parity() << 7;
        out
    }

    pub fn hex_bytes(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    pub fn hex_compact(&self) -> String {
        format!("0x{}", hex::encode(self.compact()))
    }

    /// Address of the key that signed `typed_data`.
    pub fn recover_address(&self, typed_data: &TypedData) -> Result<Address, SignerError> {
        let signature = Signature::from_slice(&self.to_bytes()[..64])
            .map_err(|err| SignerError::InvalidSignature(err.to_string()))?;
        let recovery_id = RecoveryId::from_byte(self.y_parity())
            .ok_or_else(|| SignerError::InvalidSignature("bad recovery id".to_string()))?;
        let key =
            VerifyingKey::recover_from_prehash(&typed_data.signing_hash(), &signature, recovery_id)
                .map_err(|err| SignerError::InvalidSignature(err.to_string()))?;
        Ok(address_of(&key))
    }
}

/// Ethereum address of a public key: last 20 bytes of `keccak256(x || y)`.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

fn split_words(bytes: &[u8]) -> (H256, H256) {
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..64]);
    (r, s)
}
