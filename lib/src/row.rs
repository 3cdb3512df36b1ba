//! CSV front door for strategy rows.
//!
//! A row reads `type,token,[tokenId,]borrower,amount,rate,duration,maxPotentialDebt`.
//! Lines that do not match the grammar are dropped rather than reported; the
//! [`ParseReport`] returned next to the rows says how many were lost.

use alloy_primitives::{Address, U256};
use tracing::{debug, info};

use crate::error::{StrategyError, ValidationError};
use crate::types::{CollateralOffer, CollectionOffer, LeafType, Lien, OfferRow};

/// Digit bounds of the numeric columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowGrammar {
    /// `amount`, `rate`, `tokenId` and `maxPotentialDebt`.
    pub max_wide_digits: usize,
    /// `duration`.
    pub max_duration_digits: usize,
}

impl RowGrammar {
    /// 78 digits covers `u256::MAX`; 20 digits covers `u64::MAX`.
    pub const fn new() -> Self {
        Self {
            max_wide_digits: 78,
            max_duration_digits: 20,
        }
    }
}

impl Default for RowGrammar {
    fn default() -> Self {
        Self::new()
    }
}

/// How many lines made it through validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub accepted: usize,
    /// Non-blank lines that failed the grammar.
    pub dropped: usize,
}

/// Output of [`parse_rows`]: accepted rows in file order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedRows {
    pub rows: Vec<OfferRow>,
    pub report: ParseReport,
}

/// Strip spaces and carriage returns anywhere in the line, then trim.
pub fn normalize_line(line: &str) -> String {
    line.chars()
        .filter(|c| *c != ' ' && *c != '\r')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parse every line of `text`, silently dropping the ones that fail the grammar.
pub fn parse_rows(text: &str, grammar: &RowGrammar) -> Result<ParsedRows, StrategyError> {
    let mut rows = Vec::new();
    let mut report = ParseReport::default();

    for (line_no, line) in text.split('\n').enumerate() {
        let line = normalize_line(line);
        if line.is_empty() {
            continue;
        }
        match parse_row(&line, grammar) {
            Ok(row) => {
                rows.push(row);
                report.accepted += 1;
            }
            Err(err) => {
                debug!(line = line_no + 1, %err, "dropping strategy row");
                report.dropped += 1;
            }
        }
    }

    info!(
        accepted = report.accepted,
        dropped = report.dropped,
        "parsed strategy rows"
    );

    if rows.is_empty() {
        return Err(StrategyError::EmptyStrategy);
    }
    Ok(ParsedRows { rows, report })
}

/// Parse a single line.
pub fn parse_row(line: &str, grammar: &RowGrammar) -> Result<OfferRow, ValidationError> {
    let line = normalize_line(line);
    if line.is_empty() {
        return Err(ValidationError::Empty);
    }
    let fields: Vec<&str> = line.split(',').collect();

    let leaf_type = parse_leaf_type(fields[0])?;
    let lien_at = |first: usize| -> Result<Lien, ValidationError> {
        Ok(Lien {
            amount: parse_uint("amount", fields[first], grammar.max_wide_digits)?,
            rate: parse_uint("rate", fields[first + 1], grammar.max_wide_digits)?,
            duration: parse_uint("duration", fields[first + 2], grammar.max_duration_digits)?,
            max_potential_debt: parse_uint(
                "maxPotentialDebt",
                fields[first + 3],
                grammar.max_wide_digits,
            )?,
        })
    };

    match leaf_type {
        LeafType::Collateral => {
            expect_fields(&fields, 8)?;
            Ok(OfferRow::Collateral(CollateralOffer {
                token: parse_address(fields[1])?,
                token_id: parse_uint("tokenId", fields[2], grammar.max_wide_digits)?,
                borrower: parse_address(fields[3])?,
                lien: lien_at(4)?,
            }))
        }
        LeafType::Collection => {
            // A tokenId slot may be present; its value is not committed.
            let borrower_at = match fields.len() {
                7 => 2,
                8 => {
                    if !fields[2].is_empty() {
                        parse_uint("tokenId", fields[2], grammar.max_wide_digits)?;
                        debug!(token_id = fields[2], "ignoring tokenId on collection row");
                    }
                    3
                }
                found => return Err(ValidationError::FieldCount { expected: 7, found }),
            };
            Ok(OfferRow::Collection(CollectionOffer {
                token: parse_address(fields[1])?,
                borrower: parse_address(fields[borrower_at])?,
                lien: lien_at(borrower_at + 1)?,
            }))
        }
    }
}

/// Parse a `0x`-prefixed, 40-digit hex address in any letter case.
pub fn parse_address(value: &str) -> Result<Address, ValidationError> {
    let digits = value
        .strip_prefix("0x")
        .filter(|d| d.len() == 40 && d.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or_else(|| ValidationError::InvalidAddress(value.to_string()))?;

    let mut bytes = [0u8; 20];
    hex::decode_to_slice(digits, &mut bytes)
        .map_err(|_| ValidationError::InvalidAddress(value.to_string()))?;
    Ok(Address::from(bytes))
}

/// Parse an unsigned decimal of at most `max_digits` digits that fits `U256`.
pub fn parse_uint(
    field: &'static str,
    value: &str,
    max_digits: usize,
) -> Result<U256, ValidationError> {
    let invalid = || ValidationError::InvalidNumber {
        field,
        value: value.to_string(),
    };
    if value.is_empty() || value.len() > max_digits || !value.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }
    U256::from_str_radix(value, 10).map_err(|_| invalid())
}

/// Render a row back into its canonical CSV line.
pub fn to_csv_line(row: &OfferRow) -> String {
    let lien = row.lien();
    let mut fields = vec![
        row.leaf_type().as_u8().to_string(),
        row.token().to_checksum(None),
    ];
    if let Some(token_id) = row.token_id() {
        fields.push(token_id.to_string());
    }
    fields.extend([
        row.borrower().to_checksum(None),
        lien.amount.to_string(),
        lien.rate.to_string(),
        lien.duration.to_string(),
        lien.max_potential_debt.to_string(),
    ]);
    fields.join(",")
}

fn parse_leaf_type(value: &str) -> Result<LeafType, ValidationError> {
    let unknown = || ValidationError::UnknownType(value.to_string());
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unknown());
    }
    let discriminant: u8 = value.parse().map_err(|_| unknown())?;
    LeafType::try_from(discriminant).map_err(|_| unknown())
}

fn expect_fields(fields: &[&str], expected: usize) -> Result<(), ValidationError> {
    if fields.len() != expected {
        return Err(ValidationError::FieldCount {
            expected,
            found: fields.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const BORROWER: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn grammar() -> RowGrammar {
        RowGrammar::default()
    }

    #[test]
    fn test_parse_collateral_row() {
        let line = format!("1,{TOKEN},1,{BORROWER},1000,10,86400,0");
        let row = parse_row(&line, &grammar()).unwrap();

        match row {
            OfferRow::Collateral(offer) => {
                assert_eq!(offer.token, Address::repeat_byte(0xaa));
                assert_eq!(offer.token_id, U256::from(1));
                assert_eq!(offer.borrower, Address::repeat_byte(0xbb));
                assert_eq!(offer.lien.amount, U256::from(1000));
                assert_eq!(offer.lien.rate, U256::from(10));
                assert_eq!(offer.lien.duration, U256::from(86400));
                assert_eq!(offer.lien.max_potential_debt, U256::ZERO);
            }
            other => panic!("expected collateral offer, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_collection_row() {
        let line = format!("2,{TOKEN},{BORROWER},5,6,7,8");
        let row = parse_row(&line, &grammar()).unwrap();
        assert_eq!(row.leaf_type(), LeafType::Collection);
        assert_eq!(row.lien().max_potential_debt, U256::from(8));

        let with_empty_slot = format!("2,{TOKEN},,{BORROWER},5,6,7,8");
        assert_eq!(parse_row(&with_empty_slot, &grammar()).unwrap(), row);

        let with_token_id = format!("2,{TOKEN},9,{BORROWER},5,6,7,8");
        assert_eq!(parse_row(&with_token_id, &grammar()).unwrap(), row);

        let bad_token_id = format!("2,{TOKEN},x9,{BORROWER},5,6,7,8");
        assert!(matches!(
            parse_row(&bad_token_id, &grammar()),
            Err(ValidationError::InvalidNumber { field: "tokenId", .. })
        ));
    }

    #[test]
    fn test_whitespace_and_carriage_returns_are_stripped() {
        let line = format!("  1, {TOKEN} ,1,{BORROWER},1000,10,86400,0\r");
        assert!(parse_row(&line, &grammar()).is_ok());

        let tabbed = format!("\t1,{TOKEN},1,{BORROWER},1000,10,86400,0\t");
        assert!(parse_row(&tabbed, &grammar()).is_ok());
    }

    #[test]
    fn test_rejects_malformed_rows() {
        let cases = [
            format!("3,{TOKEN},1,{BORROWER},1000,10,86400,0"),
            format!("1,{TOKEN},{BORROWER},1000,10,86400,0"),
            format!("1,0x1234,1,{BORROWER},1000,10,86400,0"),
            format!("1,{TOKEN},1,{BORROWER},-1000,10,86400,0"),
            format!("1,{TOKEN},1,{BORROWER},1000,10,,0"),
            format!("1,AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA,1,{BORROWER},1000,10,86400,0"),
            format!("1,0xZZAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA,1,{BORROWER},1000,10,86400,0"),
            "# comment".to_string(),
        ];
        for case in &cases {
            assert!(parse_row(case, &grammar()).is_err(), "accepted {case}");
        }
    }

    #[test]
    fn test_numeric_bounds() {
        let long_duration = "1".repeat(21);
        let line = format!("1,{TOKEN},1,{BORROWER},1000,10,{long_duration},0");
        assert!(matches!(
            parse_row(&line, &grammar()),
            Err(ValidationError::InvalidNumber { field: "duration", .. })
        ));

        let max = U256::MAX.to_string();
        assert_eq!(max.len(), 78);
        let line = format!("1,{TOKEN},{max},{BORROWER},{max},{max},86400,{max}");
        assert!(parse_row(&line, &grammar()).is_ok());

        // 78 digits but larger than u256::MAX
        let too_big = "9".repeat(78);
        let line = format!("1,{TOKEN},1,{BORROWER},{too_big},10,86400,0");
        assert!(parse_row(&line, &grammar()).is_err());
    }

    #[test]
    fn test_parse_rows_filters_and_reports() {
        let text = format!(
            "1,{TOKEN},1,{BORROWER},1000,10,86400,0\n\
             not,a,row\n\
             \n\
             2,{TOKEN},{BORROWER},5,6,7,8\r\n"
        );
        let parsed = parse_rows(&text, &grammar()).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(
            parsed.report,
            ParseReport {
                accepted: 2,
                dropped: 1
            }
        );
        assert_eq!(parsed.rows[0].leaf_type(), LeafType::Collateral);
        assert_eq!(parsed.rows[1].leaf_type(), LeafType::Collection);
    }

    #[test]
    fn test_only_malformed_rows_is_empty_strategy() {
        let text = format!("1,{TOKEN},{BORROWER},1000\n");
        assert_eq!(
            parse_rows(&text, &grammar()),
            Err(StrategyError::EmptyStrategy)
        );
        assert_eq!(parse_rows("", &grammar()), Err(StrategyError::EmptyStrategy));
    }

    #[test]
    fn test_csv_line_round_trip() {
        let line = format!("1,{TOKEN},1,{BORROWER},1000,10,86400,0");
        let row = parse_row(&line, &grammar()).unwrap();
        let rendered = to_csv_line(&row);
        assert!(rendered.starts_with("1,0x"));
        assert_eq!(parse_row(&rendered, &grammar()).unwrap(), row);
    }
}
