use std::fmt;
use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, SigningKey};
use tracing::debug;

use crate::error::SignerError;
use crate::signature::{address_of, StrategySignature};
use crate::typed_data::TypedData;

/// Something that can sign typed data out of process, such as a wallet
/// reached over JSON-RPC.
///
/// Implementations make one request and return the raw 65-byte
/// `r || s || v` reply.
#[async_trait]
pub trait ExternalSigner: Send + Sync {
    async fn request_signature(&self, typed_data: &TypedData) -> Result<Vec<u8>, SignerError>;
}

/// In-process secp256k1 key.
#[derive(Clone)]
pub struct LocalKey {
    key: SigningKey,
}

impl LocalKey {
    pub fn from_bytes(secret: &[u8]) -> Result<Self, SignerError> {
        let key = SigningKey::from_slice(secret)
            .map_err(|err| SignerError::InvalidKey(err.to_string()))?;
        Ok(Self { key })
    }

    /// Parse a 32-byte key given as hex, with or without `0x`.
    pub fn from_hex(secret: &str) -> Result<Self, SignerError> {
        let secret = secret.trim();
        let digits = secret.strip_prefix("0x").unwrap_or(secret);
        let bytes = hex::decode(digits).map_err(|err| SignerError::InvalidKey(err.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn address(&self) -> Address {
        address_of(self.key.verifying_key())
    }

    /// Sign the EIP-712 hash of `typed_data` with an RFC 6979 nonce.
    pub fn sign(&self, typed_data: &TypedData) -> Result<StrategySignature, SignerError> {
        let hash = typed_data.signing_hash();
        let (mut signature, mut recovery_id) = self
            .key
            .sign_prehash_recoverable(&hash)
            .map_err(|err| SignerError::Signing(err.to_string()))?;

        if let Some(low) = signature.normalize_s() {
            signature = low;
            recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
        }

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        StrategySignature::new(r, s, recovery_id.to_byte())
    }
}

impl fmt::Debug for LocalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKey")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Signs strategy roots with whichever signer is configured.
///
/// An external signer takes precedence over a local key.
#[derive(Clone, Default)]
pub struct StrategySigner {
    local: Option<LocalKey>,
    external: Option<Arc<dyn ExternalSigner>>,
}

impl StrategySigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_key(mut self, key: LocalKey) -> Self {
        self.local = Some(key);
        self
    }

    pub fn with_external(mut self, signer: Arc<dyn ExternalSigner>) -> Self {
        self.external = Some(signer);
        self
    }

    pub fn local_key(&self) -> Option<&LocalKey> {
        self.local.as_ref()
    }

    pub async fn sign(&self, typed_data: &TypedData) -> Result<StrategySignature, SignerError> {
        if let Some(external) = &self.external {
            debug!("requesting signature from external signer");
            let reply = external.request_signature(typed_data).await?;
            return StrategySignature::from_bytes(&reply);
        }
        self.sign_local(typed_data)
    }

    /// Synchronous path; ignores any external signer.
    pub fn sign_local(&self, typed_data: &TypedData) -> Result<StrategySignature, SignerError> {
        match &self.local {
            Some(key) => key.sign(typed_data),
            None => Err(SignerError::SigningUnavailable),
        }
    }
}

impl fmt::Debug for StrategySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategySigner")
            .field("local", &self.local)
            .field("external", &self.external.is_some())
            .finish()
    }
}
