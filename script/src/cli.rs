use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol_data, SolType};
use clap::Args;
use strategy_lib::{StrategyMetadata, StrategyTree};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Vault settings shared by every command that signs a root.
#[derive(Args, Debug, Clone)]
pub struct StrategyArgs {
    /// Strategy format version.
    #[arg(long, env = "STRATEGY_VERSION", default_value_t = 0)]
    pub version: u8,

    /// Unix timestamp after which the strategy expires.
    #[arg(long, env = "STRATEGY_EXPIRATION")]
    pub expiration: Option<U256>,

    #[arg(long, env = "STRATEGY_NONCE", default_value = "0")]
    pub nonce: U256,

    /// Vault the root is bound to. Zero opens a new vault.
    #[arg(long, env = "STRATEGY_VAULT", default_value = "0x0000000000000000000000000000000000000000")]
    pub vault: Address,

    #[arg(long, env = "STRATEGY_DELEGATE")]
    pub delegate: Option<Address>,

    #[arg(long, env = "STRATEGY_PUBLIC")]
    pub public: Option<bool>,

    /// EIP-712 verifying contract; defaults to the vault.
    #[arg(long, env = "VERIFYING_CONTRACT")]
    pub verifying_contract: Option<Address>,

    #[arg(long, env = "CHAIN_ID", default_value_t = 1)]
    pub chain_id: u64,
}

impl StrategyArgs {
    pub fn metadata(&self, strategist: Address) -> Result<StrategyMetadata, Box<dyn Error>> {
        let expiration = self
            .expiration
            .ok_or("an expiration is required to sign a strategy")?;
        Ok(StrategyMetadata {
            version: self.version,
            strategist,
            delegate: self.delegate,
            public: self.public,
            expiration,
            nonce: self.nonce,
            vault: self.vault,
        })
    }

    pub fn verifying_contract(&self) -> Address {
        self.verifying_contract.unwrap_or(self.vault)
    }
}

/// Install the `tracing` subscriber. Filter comes from `RUST_LOG`, default `info`.
///
/// Logs go to stderr; stdout carries command output only.
pub fn setup_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Read a CSV strategy file and build its tree.
pub fn read_strategy(path: &Path) -> Result<StrategyTree, Box<dyn Error>> {
    let text = fs::read_to_string(path)?;
    let strategy = StrategyTree::from_csv(&text)?;
    let report = strategy.report();
    info!(
        file = %path.display(),
        accepted = report.accepted,
        dropped = report.dropped,
        "loaded strategy"
    );
    Ok(strategy)
}

/// Print to stdout, or write to `out` when given.
pub fn write_output(out: Option<&PathBuf>, contents: &str) -> Result<(), Box<dyn Error>> {
    match out {
        Some(path) => {
            fs::write(path, contents)?;
            info!(file = %path.display(), "wrote output");
        }
        None => println!("{contents}"),
    }
    Ok(())
}

/// Decode `0x`-prefixed or bare hex.
pub fn parse_hex(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let value = value.trim();
    hex::decode(value.strip_prefix("0x").unwrap_or(value))
}

pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

type StrategyData = (sol_data::Uint<8>, sol_data::Uint<256>, sol_data::Address);

/// Decode `abi.encode(uint8 version, uint256 expiration, address vault)`.
pub fn decode_strategy_data(data: &[u8]) -> Result<(u8, U256, Address), Box<dyn Error>> {
    Ok(StrategyData::abi_decode_params(data)?)
}
