//! Deterministic JSON form of a signed strategy.
//!
//! Every object is a wire struct whose fields are declared in ascending key
//! order, so the output never depends on map iteration order. Numbers are
//! decimal strings, addresses carry checksum casing and digests are `0x` hex.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::signature::StrategySignature;
use crate::typed_data::{hex_h256, parse_address, parse_h256, TypedData};
use crate::types::{CollateralOffer, CollectionOffer, LeafType, Lien, OfferRow, StrategyLeaf};

/// A root's typed data, its signature and the leaves it commits to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedStrategyBundle {
    typed_data: TypedData,
    signature: StrategySignature,
    leaves: Vec<StrategyLeaf>,
}

impl SignedStrategyBundle {
    pub fn new(typed_data: TypedData, signature: StrategySignature, leaves: Vec<StrategyLeaf>) -> Self {
        Self {
            typed_data,
            signature,
            leaves,
        }
    }

    pub fn typed_data(&self) -> &TypedData {
        &self.typed_data
    }

    pub fn signature(&self) -> &StrategySignature {
        &self.signature
    }

    pub fn leaves(&self) -> &[StrategyLeaf] {
        &self.leaves
    }
}

pub fn encode_bundle(bundle: &SignedStrategyBundle) -> Result<String, CodecError> {
    let json = BundleJson {
        leaves: bundle.leaves.iter().map(LeafJson::from).collect(),
        signature: SignatureJson::from(&bundle.signature),
        typed_data: bundle.typed_data.clone(),
    };
    Ok(serde_json::to_string(&json)?)
}

pub fn decode_bundle(json: &str) -> Result<SignedStrategyBundle, CodecError> {
    let json: BundleJson = serde_json::from_str(json)?;

    let leaves = json
        .leaves
        .into_iter()
        .map(leaf_from_json)
        .collect::<Result<Vec<_>, _>>()?;
    let signature = signature_from_json(json.signature)?;

    Ok(SignedStrategyBundle {
        typed_data: json.typed_data,
        signature,
        leaves,
    })
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct BundleJson {
    leaves: Vec<LeafJson>,
    signature: SignatureJson,
    #[serde(rename = "typedData")]
    typed_data: TypedData,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LeafJson {
    borrower: String,
    leaf: String,
    lien: LienJson,
    token: String,
    #[serde(rename = "tokenId", default, skip_serializing_if = "Option::is_none")]
    token_id: Option<String>,
    #[serde(rename = "type")]
    leaf_type: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct LienJson {
    amount: String,
    duration: String,
    max_potential_debt: String,
    rate: String,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SignatureJson {
    compact: String,
    r: String,
    s: String,
    v: u8,
}

impl From<&StrategyLeaf> for LeafJson {
    fn from(leaf: &StrategyLeaf) -> Self {
        let row = leaf.row();
        let lien = row.lien();
        LeafJson {
            borrower: row.borrower().to_checksum(None),
            leaf: leaf.hex_leaf(),
            lien: LienJson {
                amount: lien.amount.to_string(),
                duration: lien.duration.to_string(),
                max_potential_debt: lien.max_potential_debt.to_string(),
                rate: lien.rate.to_string(),
            },
            token: row.token().to_checksum(None),
            token_id: row.token_id().map(|id| id.to_string()),
            leaf_type: row.leaf_type().as_u8().to_string(),
        }
    }
}

fn leaf_from_json(json: LeafJson) -> Result<StrategyLeaf, CodecError> {
    let leaf_type = json
        .leaf_type
        .parse::<u8>()
        .ok()
        .and_then(|byte| LeafType::try_from(byte).ok())
        .ok_or_else(|| malformed("leaf type", &json.leaf_type))?;

    let token = parse_address(&json.token)?;
    let borrower = parse_address(&json.borrower)?;
    let lien = Lien {
        amount: parse_decimal(&json.lien.amount)?,
        rate: parse_decimal(&json.lien.rate)?,
        duration: parse_decimal(&json.lien.duration)?,
        max_potential_debt: parse_decimal(&json.lien.max_potential_debt)?,
    };

    let row = match (leaf_type, json.token_id) {
        (LeafType::Collateral, Some(token_id)) => OfferRow::Collateral(CollateralOffer {
            token,
            token_id: parse_decimal(&token_id)?,
            borrower,
            lien,
        }),
        (LeafType::Collection, None) => OfferRow::Collection(CollectionOffer {
            token,
            borrower,
            lien,
        }),
        (LeafType::Collateral, None) => {
            return Err(CodecError::MalformedPayload(
                "collateral leaf without tokenId".to_string(),
            ))
        }
        (LeafType::Collection, Some(_)) => {
            return Err(CodecError::MalformedPayload(
                "collection leaf with tokenId".to_string(),
            ))
        }
    };

    let leaf = StrategyLeaf::new(row);
    if leaf.leaf() != parse_h256(&json.leaf)? {
        return Err(malformed("leaf", &json.leaf));
    }
    Ok(leaf)
}

impl From<&StrategySignature> for SignatureJson {
    fn from(signature: &StrategySignature) -> Self {
        SignatureJson {
            compact: signature.hex_compact(),
            r: hex_h256(&signature.r()),
            s: hex_h256(&signature.s()),
            v: signature.v(),
        }
    }
}

fn signature_from_json(json: SignatureJson) -> Result<StrategySignature, CodecError> {
    let signature = StrategySignature::new(parse_h256(&json.r)?, parse_h256(&json.s)?, json.v)
        .map_err(|err| CodecError::MalformedPayload(err.to_string()))?;
    if signature.hex_compact() != json.compact.to_ascii_lowercase() {
        return Err(malformed("compact signature", &json.compact));
    }
    Ok(signature)
}

fn parse_decimal(value: &str) -> Result<U256, CodecError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("number", value));
    }
    U256::from_str_radix(value, 10).map_err(|_| malformed("number", value))
}

fn malformed(what: &str, value: &str) -> CodecError {
    CodecError::MalformedPayload(format!("invalid {what} `{value}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StrategyMetadata;
    use alloy_primitives::Address;

    fn leaves() -> Vec<StrategyLeaf> {
        let lien = Lien {
            amount: U256::from(1000),
            rate: U256::from(10),
            duration: U256::from(86400),
            max_potential_debt: U256::ZERO,
        };
        vec![
            StrategyLeaf::new(OfferRow::Collateral(CollateralOffer {
                token: Address::repeat_byte(0xaa),
                token_id: U256::from(1),
                borrower: Address::repeat_byte(0xbb),
                lien,
            })),
            StrategyLeaf::new(OfferRow::Collection(CollectionOffer {
                token: Address::repeat_byte(0xcc),
                borrower: Address::ZERO,
                lien,
            })),
        ]
    }

    fn bundle() -> SignedStrategyBundle {
        let metadata = StrategyMetadata {
            version: 0,
            strategist: Address::repeat_byte(0x01),
            delegate: None,
            public: None,
            expiration: U256::from(1_700_000_000u64),
            nonce: U256::from(2),
            vault: Address::repeat_byte(0x02),
        };
        let typed_data = TypedData::new(&metadata, [0x33; 32], metadata.vault, 1);
        let signature = StrategySignature::new([0x44; 32], [0x55; 32], 28).unwrap();
        SignedStrategyBundle::new(typed_data, signature, leaves())
    }

    #[test]
    fn test_round_trip() {
        let bundle = bundle();
        let json = encode_bundle(&bundle).unwrap();
        assert_eq!(decode_bundle(&json).unwrap(), bundle);
    }

    #[test]
    fn test_encoding_is_byte_identical() {
        assert_eq!(encode_bundle(&bundle()).unwrap(), encode_bundle(&bundle()).unwrap());
    }

    #[test]
    fn test_wire_layout() {
        let json = encode_bundle(&bundle()).unwrap();
        assert!(json.starts_with(r#"{"leaves":[{"borrower":""#));
        assert!(json.contains(r#""lien":{"amount":"1000","duration":"86400","maxPotentialDebt":"0","rate":"10"}"#));
        assert!(json.contains(r#""tokenId":"1","type":"1"}"#));
        assert!(json.contains(&Address::repeat_byte(0xaa).to_checksum(None)));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["leaves"][1].get("tokenId").is_none());
        assert_eq!(value["signature"]["v"], 28);
        assert_eq!(value["typedData"]["primaryType"], "StrategyDetails");
    }

    #[test]
    fn test_rejects_tampered_leaf() {
        let json = encode_bundle(&bundle()).unwrap();
        let tampered = json.replacen(r#""amount":"1000""#, r#""amount":"1001""#, 1);
        assert!(matches!(
            decode_bundle(&tampered),
            Err(CodecError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_rejects_inconsistent_signature() {
        let json = encode_bundle(&bundle()).unwrap();
        let tampered = json.replace(r#""v":28"#, r#""v":27"#);
        assert!(decode_bundle(&tampered).is_err());
    }

    #[test]
    fn test_high_s_signature_decodes_normalized() {
        let bundle = bundle();
        let json = encode_bundle(&bundle).unwrap();

        let order = U256::from_str_radix(
            "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141",
            16,
        )
        .unwrap();
        let high = (order - U256::from_be_bytes([0x55u8; 32])).to_be_bytes::<32>();
        let flipped = json
            .replace(&hex_h256(&[0x55; 32]), &hex_h256(&high))
            .replace(r#""v":28"#, r#""v":27"#);
        assert_ne!(flipped, json);

        let decoded = decode_bundle(&flipped).unwrap();
        assert_eq!(decoded.signature(), bundle.signature());
        assert_eq!(encode_bundle(&decoded).unwrap(), json);
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(decode_bundle("not json").is_err());
        assert!(decode_bundle("{}").is_err());

        let json = encode_bundle(&bundle()).unwrap();
        let extra = json.replacen('{', r#"{"extra":true,"#, 1);
        assert!(decode_bundle(&extra).is_err());
    }
}
