use alloy::primitives::Address;
use alloy::providers::Provider;
use async_trait::async_trait;
use strategy_lib::{ExternalSigner, SignerError, TypedData};
use tracing::debug;

use crate::cli::parse_hex;

/// Signs through a node or wallet exposing `eth_signTypedData_v4`.
///
/// One request per signature, no retries.
pub struct RpcSigner<P> {
    provider: P,
    account: Address,
}

impl<P: Provider> RpcSigner<P> {
    pub fn new(provider: P, account: Address) -> Self {
        Self { provider, account }
    }

    /// Use the first account reported by `eth_accounts`.
    pub async fn first_account(provider: P) -> Result<Self, SignerError> {
        let accounts = provider
            .get_accounts()
            .await
            .map_err(|err| SignerError::Remote(err.to_string()))?;
        let account = accounts
            .first()
            .copied()
            .ok_or_else(|| SignerError::Remote("node exposes no accounts".to_string()))?;
        Ok(Self::new(provider, account))
    }

    pub fn account(&self) -> Address {
        self.account
    }
}

#[async_trait]
impl<P: Provider> ExternalSigner for RpcSigner<P> {
    async fn request_signature(&self, typed_data: &TypedData) -> Result<Vec<u8>, SignerError> {
        debug!(account = %self.account, "eth_signTypedData_v4");
        let reply: String = self
            .provider
            .raw_request(
                "eth_signTypedData_v4".into(),
                (self.account, typed_data.clone()),
            )
            .await
            .map_err(|err| SignerError::Remote(err.to_string()))?;
        decode_signature_reply(&reply)
    }
}

/// Decode an `eth_signTypedData_v4` result into the 65 `r || s || v` bytes.
pub fn decode_signature_reply(reply: &str) -> Result<Vec<u8>, SignerError> {
    let bytes = parse_hex(reply).map_err(|err| SignerError::InvalidSignature(err.to_string()))?;
    if bytes.len() != 65 {
        return Err(SignerError::InvalidSignature(format!(
            "wallet returned {} bytes, expected 65",
            bytes.len()
        )));
    }
    Ok(bytes)
}
