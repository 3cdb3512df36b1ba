//! EIP-712 payload binding a strategy root to a vault.
//!
//! [`TypedData`] serializes to the exact JSON object handed to
//! `eth_signTypedData_v4`, and [`TypedData::signing_hash`] is the digest a
//! local key signs.

use std::borrow::Cow;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::types::{StrategyMetadata, H256};
use crate::StrategyDetails;

pub const DOMAIN_TYPE: &str = "EIP712Domain";
pub const PRIMARY_TYPE: &str = "StrategyDetails";

const DOMAIN_FIELDS: [(&str, &str); 3] = [
    ("version", "string"),
    ("chainId", "uint256"),
    ("verifyingContract", "address"),
];

const DETAILS_FIELDS: [(&str, &str); 3] = [
    ("nonce", "uint256"),
    ("deadline", "uint256"),
    ("root", "bytes32"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategyDomain {
    /// Strategy format version, rendered as a decimal string.
    pub version: u8,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategyMessage {
    pub nonce: U256,
    pub deadline: U256,
    pub root: H256,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "TypedDataJson", try_from = "TypedDataJson")]
pub struct TypedData {
    pub domain: StrategyDomain,
    pub message: StrategyMessage,
}

impl TypedData {
    pub fn new(
        metadata: &StrategyMetadata,
        root: H256,
        verifying_contract: Address,
        chain_id: u64,
    ) -> Self {
        Self {
            domain: StrategyDomain {
                version: metadata.version,
                chain_id,
                verifying_contract,
            },
            message: StrategyMessage {
                nonce: metadata.nonce,
                deadline: metadata.expiration,
                root,
            },
        }
    }

    pub fn eip712_domain(&self) -> Eip712Domain {
        Eip712Domain::new(
            None,
            Some(Cow::Owned(self.domain.version.to_string())),
            Some(U256::from(self.domain.chain_id)),
            Some(self.domain.verifying_contract),
            None,
        )
    }

    pub fn details(&self) -> StrategyDetails {
        StrategyDetails {
            nonce: self.message.nonce,
            deadline: self.message.deadline,
            root: B256::from(self.message.root),
        }
    }

    /// `keccak256(0x1901 || domainSeparator || hashStruct(message))`
    pub fn signing_hash(&self) -> H256 {
        self.details().eip712_signing_hash(&self.eip712_domain()).0
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Even-length `0x` hex, `0x00` for zero.
pub fn to_hex_quantity(value: &U256) -> String {
    let digits = format!("{value:x}");
    if digits.len() % 2 == 1 {
        format!("0x0{digits}")
    } else {
        format!("0x{digits}")
    }
}

pub fn parse_hex_quantity(value: &str) -> Result<U256, CodecError> {
    let digits = strip_prefix(value)?;
    if digits.is_empty() {
        return Err(malformed("quantity", value));
    }
    U256::from_str_radix(digits, 16).map_err(|_| malformed("quantity", value))
}

pub(crate) fn hex_h256(value: &H256) -> String {
    format!("0x{}", hex::encode(value))
}

pub(crate) fn parse_h256(value: &str) -> Result<H256, CodecError> {
    let mut out = [0u8; 32];
    hex::decode_to_slice(strip_prefix(value)?, &mut out).map_err(|_| malformed("digest", value))?;
    Ok(out)
}

pub(crate) fn parse_address(value: &str) -> Result<Address, CodecError> {
    value.parse().map_err(|_| malformed("address", value))
}

fn strip_prefix(value: &str) -> Result<&str, CodecError> {
    value
        .strip_prefix("0x")
        .ok_or_else(|| malformed("hex value", value))
}

fn malformed(what: &str, value: &str) -> CodecError {
    CodecError::MalformedPayload(format!("invalid {what} `{value}`"))
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TypedDataJson {
    domain: DomainJson,
    message: MessageJson,
    #[serde(rename = "primaryType")]
    primary_type: String,
    types: TypesJson,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DomainJson {
    chain_id: u64,
    verifying_contract: String,
    version: String,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MessageJson {
    deadline: String,
    nonce: String,
    root: String,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TypesJson {
    #[serde(rename = "EIP712Domain")]
    domain: Vec<TypeFieldJson>,
    #[serde(rename = "StrategyDetails")]
    details: Vec<TypeFieldJson>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TypeFieldJson {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

fn type_fields(fields: &[(&str, &str)]) -> Vec<TypeFieldJson> {
    fields
        .iter()
        .map(|(name, ty)| TypeFieldJson {
            name: name.to_string(),
            ty: ty.to_string(),
        })
        .collect()
}

impl From<TypedData> for TypedDataJson {
    fn from(data: TypedData) -> Self {
        TypedDataJson {
            domain: DomainJson {
                chain_id: data.domain.chain_id,
                verifying_contract: data.domain.verifying_contract.to_checksum(None),
                version: data.domain.version.to_string(),
            },
            message: MessageJson {
                deadline: to_hex_quantity(&data.message.deadline),
                nonce: to_hex_quantity(&data.message.nonce),
                root: hex_h256(&data.message.root),
            },
            primary_type: PRIMARY_TYPE.to_string(),
            types: TypesJson {
                domain: type_fields(&DOMAIN_FIELDS),
                details: type_fields(&DETAILS_FIELDS),
            },
        }
    }
}

impl TryFrom<TypedDataJson> for TypedData {
    type Error = CodecError;

    fn try_from(json: TypedDataJson) -> Result<Self, Self::Error> {
        if json.primary_type != PRIMARY_TYPE {
            return Err(malformed("primary type", &json.primary_type));
        }
        if json.types.domain != type_fields(&DOMAIN_FIELDS) {
            return Err(CodecError::MalformedPayload(format!(
                "unexpected {DOMAIN_TYPE} fields"
            )));
        }
        if json.types.details != type_fields(&DETAILS_FIELDS) {
            return Err(CodecError::MalformedPayload(format!(
                "unexpected {PRIMARY_TYPE} fields"
            )));
        }

        let version = json
            .domain
            .version
            .parse::<u8>()
            .map_err(|_| malformed("version", &json.domain.version))?;

        Ok(TypedData {
            domain: StrategyDomain {
                version,
                chain_id: json.domain.chain_id,
                verifying_contract: parse_address(&json.domain.verifying_contract)?,
            },
            message: StrategyMessage {
                nonce: parse_hex_quantity(&json.message.nonce)?,
                deadline: parse_hex_quantity(&json.message.deadline)?,
                root: parse_h256(&json.message.root)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi_encoding::keccak256;

    fn metadata() -> StrategyMetadata {
        StrategyMetadata {
            version: 0,
            strategist: Address::repeat_byte(0x11),
            delegate: None,
            public: Some(false),
            expiration: U256::from(1_700_000_000u64),
            nonce: U256::ZERO,
            vault: Address::repeat_byte(0x22),
        }
    }

    fn typed_data() -> TypedData {
        TypedData::new(&metadata(), [0x5a; 32], Address::repeat_byte(0x22), 1)
    }

    fn word(value: U256) -> [u8; 32] {
        value.to_be_bytes::<32>()
    }

    #[test]
    fn test_hex_quantity() {
        assert_eq!(to_hex_quantity(&U256::ZERO), "0x00");
        assert_eq!(to_hex_quantity(&U256::from(0xabc)), "0x0abc");
        assert_eq!(to_hex_quantity(&U256::from(255)), "0xff");
        assert_eq!(parse_hex_quantity("0x0abc").unwrap(), U256::from(0xabc));
        assert!(parse_hex_quantity("0x").is_err());
        assert!(parse_hex_quantity("12").is_err());
    }

    #[test]
    fn test_encode_type() {
        assert_eq!(
            StrategyDetails::eip712_encode_type(),
            "StrategyDetails(uint256 nonce,uint256 deadline,bytes32 root)"
        );
    }

    #[test]
    fn test_signing_hash_matches_manual_digest() {
        let data = typed_data();

        let domain_type =
            keccak256(b"EIP712Domain(string version,uint256 chainId,address verifyingContract)");
        let mut buf = Vec::new();
        buf.extend_from_slice(&domain_type);
        buf.extend_from_slice(&keccak256(b"0"));
        buf.extend_from_slice(&word(U256::from(1)));
        buf.extend_from_slice(&[0u8; 12]);
        buf.extend_from_slice(&[0x22; 20]);
        let separator = keccak256(&buf);
        assert_eq!(data.eip712_domain().separator().0, separator);

        let details_type = keccak256(b"StrategyDetails(uint256 nonce,uint256 deadline,bytes32 root)");
        let mut buf = Vec::new();
        buf.extend_from_slice(&details_type);
        buf.extend_from_slice(&word(U256::ZERO));
        buf.extend_from_slice(&word(U256::from(1_700_000_000u64)));
        buf.extend_from_slice(&[0x5a; 32]);
        let struct_hash = keccak256(&buf);

        let mut buf = vec![0x19, 0x01];
        buf.extend_from_slice(&separator);
        buf.extend_from_slice(&struct_hash);
        assert_eq!(data.signing_hash(), keccak256(&buf));
    }

    #[test]
    fn test_signing_hash_binds_every_field() {
        let base = typed_data().signing_hash();

        let mut other = typed_data();
        other.domain.chain_id = 5;
        assert_ne!(other.signing_hash(), base);

        let mut other = typed_data();
        other.message.nonce = U256::from(1);
        assert_ne!(other.signing_hash(), base);

        let mut other = typed_data();
        other.domain.verifying_contract = Address::repeat_byte(0x23);
        assert_ne!(other.signing_hash(), base);
    }

    #[test]
    fn test_json_payload() {
        let json = typed_data().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["primaryType"], "StrategyDetails");
        assert_eq!(value["domain"]["version"], "0");
        assert_eq!(value["domain"]["chainId"], 1);
        assert_eq!(
            value["domain"]["verifyingContract"],
            Address::repeat_byte(0x22).to_checksum(None)
        );
        assert_eq!(value["message"]["nonce"], "0x00");
        assert_eq!(value["message"]["deadline"], "0x6553f100");
        assert_eq!(value["message"]["root"], format!("0x{}", "5a".repeat(32)));
        assert_eq!(value["types"]["StrategyDetails"][2]["type"], "bytes32");

        // keys are emitted in a fixed order
        assert!(json.starts_with(r#"{"domain":{"chainId":1,"#));
        assert_eq!(TypedData::from_json(&json).unwrap(), typed_data());
    }

    #[test]
    fn test_json_rejects_schema_mismatch() {
        let json = typed_data().to_json().unwrap();

        let renamed = json.replace("\"deadline\",\"type\":\"uint256\"", "\"expiry\",\"type\":\"uint256\"");
        assert!(TypedData::from_json(&renamed).is_err());

        let primary = json.replace("\"primaryType\":\"StrategyDetails\"", "\"primaryType\":\"Other\"");
        assert!(TypedData::from_json(&primary).is_err());

        let extra = json.replacen('{', r#"{"extra":1,"#, 1);
        assert!(TypedData::from_json(&extra).is_err());
    }
}
