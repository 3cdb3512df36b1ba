//! Strategy tree tooling: roots, proofs, signing and loan proofs.
//!
//! You can run this script using the following command:
//! ```shell
//! RUST_LOG=info cargo run --release -- root --file strategy.csv
//! ```
//! or, to sign with a local key read from `.env`:
//! ```shell
//! cargo run --release -- sign --file strategy.csv --expiration 1893456000
//! ```

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use strategy_lib::{
    abi_encode_loan_proof, decode_bundle, decode_row, encode_bundle, row::to_csv_line,
    verify_multi_proof, LocalKey, SignedStrategyBundle, StrategySigner, StrategyTree,
};
use strategy_script::cli::{
    decode_strategy_data, parse_hex, read_strategy, setup_logger, to_hex, write_output,
    StrategyArgs,
};
use tracing::info;

/// The arguments for the command.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the root of a strategy file.
    Root {
        #[arg(long)]
        file: PathBuf,
    },
    /// Print the proof for one row of a strategy file.
    Proof {
        #[arg(long)]
        file: PathBuf,
        /// Zero-based row among the accepted rows.
        #[arg(long)]
        row: usize,
    },
    /// Print a multi-proof for several rows.
    Multiproof {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_delimiter = ',', required = true)]
        rows: Vec<usize>,
    },
    /// Sign a strategy root with a local key and emit the bundle.
    Sign {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
        #[command(flatten)]
        strategy: StrategyArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check a signed bundle and print its signer.
    Verify {
        #[arg(long)]
        bundle: PathBuf,
    },
    /// Build a one-row strategy from ABI-encoded terms and print
    /// `abi.encode(root, proof, signature)`.
    LoanProof {
        /// ABI-encoded offer row.
        #[arg(long)]
        terms: String,
        #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
        /// ABI-encoded `(uint8 version, uint256 expiration, address vault)`;
        /// overrides the matching strategy flags.
        #[arg(long)]
        strategy_data: Option<String>,
        #[command(flatten)]
        strategy: StrategyArgs,
    },
    /// Decode ABI-encoded terms into a CSV row.
    Decode {
        #[arg(long)]
        terms: String,
    },
}

#[derive(Serialize)]
struct ProofOutput {
    leaf: String,
    proof: Vec<String>,
    root: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MultiProofOutput {
    flags: Vec<bool>,
    leaf_count: usize,
    leaves: Vec<String>,
    proof: Vec<String>,
    root: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    setup_logger();

    // Parse the command line arguments.
    let args = Args::parse();

    match args.command {
        Command::Root { file } => {
            let strategy = read_strategy(&file)?;
            println!("{}", strategy.hex_root());
        }
        Command::Proof { file, row } => {
            let strategy = read_strategy(&file)?;
            let leaf = strategy
                .leaves()
                .get(row)
                .ok_or_else(|| format!("row {row} out of range"))?;
            let output = ProofOutput {
                leaf: leaf.hex_leaf(),
                proof: strategy
                    .proof_for_row(row)?
                    .iter()
                    .map(|node| to_hex(node))
                    .collect(),
                root: strategy.hex_root(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Multiproof { file, rows } => {
            let strategy = read_strategy(&file)?;
            let multi = strategy.multi_proof_for_rows(&rows)?;
            let leaves = strategy.tree().multi_proof_leaves(&multi);
            if !verify_multi_proof(&strategy.root(), &multi, &leaves) {
                return Err("generated multi-proof does not verify".into());
            }
            let output = MultiProofOutput {
                flags: multi.flags,
                leaf_count: multi.leaf_count,
                leaves: leaves.iter().map(|leaf| to_hex(leaf)).collect(),
                proof: multi.proof.iter().map(|node| to_hex(node)).collect(),
                root: strategy.hex_root(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Sign {
            file,
            private_key,
            strategy: settings,
            out,
        } => {
            let strategy = read_strategy(&file)?;
            let key = LocalKey::from_hex(&private_key)?;
            let metadata = settings.metadata(key.address())?;
            let typed_data =
                strategy.typed_data(&metadata, settings.verifying_contract(), settings.chain_id);

            let signer = StrategySigner::new().with_local_key(key);
            let signature = signer.sign_local(&typed_data)?;
            info!(root = %strategy.hex_root(), signer = %metadata.strategist, "signed strategy");

            let bundle = SignedStrategyBundle::new(typed_data, signature, strategy.leaves().to_vec());
            write_output(out.as_ref(), &encode_bundle(&bundle)?)?;
        }
        Command::Verify { bundle } => {
            let bundle = decode_bundle(&std::fs::read_to_string(&bundle)?)?;
            let rows = bundle.leaves().iter().map(|leaf| *leaf.row()).collect();
            let strategy = StrategyTree::from_rows(rows)?;
            if strategy.root() != bundle.typed_data().message.root {
                return Err("bundle leaves do not match the signed root".into());
            }
            let signer = bundle.signature().recover_address(bundle.typed_data())?;
            println!("{}", signer.to_checksum(None));
        }
        Command::LoanProof {
            terms,
            private_key,
            strategy_data,
            strategy: mut settings,
        } => {
            let row = decode_row(&parse_hex(&terms)?)?;
            if let Some(data) = strategy_data {
                let (version, expiration, vault) = decode_strategy_data(&parse_hex(&data)?)?;
                settings.version = version;
                settings.expiration = Some(expiration);
                settings.vault = vault;
            }

            let key = LocalKey::from_hex(&private_key)?;
            let mut metadata = settings.metadata(key.address())?;
            metadata.delegate = Some(key.address());

            let strategy = StrategyTree::from_rows(vec![row])?;
            let typed_data =
                strategy.typed_data(&metadata, settings.verifying_contract(), settings.chain_id);
            let signature = key.sign(&typed_data)?;
            let proof = strategy.proof_for_row(0)?;

            println!(
                "{}",
                to_hex(&abi_encode_loan_proof(&strategy.root(), &proof, &signature))
            );
        }
        Command::Decode { terms } => {
            let row = decode_row(&parse_hex(&terms)?)?;
            println!("{}", to_csv_line(&row));
        }
    }

    Ok(())
}
