//! Build a borrower whitelist tree and print `abi.encode(root, proof)`.
//!
//! Usage:
//! cargo run --bin whitelist -- 0xabc... 0xdef...

use std::error::Error;

use alloy_primitives::Address;
use clap::Parser;
use strategy_lib::{abi_encode_root_proof, whitelist_leaf, whitelist_tree};
use strategy_script::cli::{setup_logger, to_hex};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address whose proof is printed; the first leaf of the tree when omitted.
    #[arg(long)]
    prove: Option<Address>,

    #[arg(required = true)]
    addresses: Vec<Address>,
}

fn main() -> Result<(), Box<dyn Error>> {
    setup_logger();
    let args = Args::parse();

    let tree = whitelist_tree(&args.addresses)?;
    let index = match args.prove {
        Some(address) => tree
            .index_of(&whitelist_leaf(&address))
            .ok_or_else(|| format!("{address} is not in the whitelist"))?,
        None => 0,
    };
    info!(addresses = args.addresses.len(), root = %tree.hex_root(), "built whitelist");

    let proof = tree.proof(index)?;
    println!("{}", to_hex(&abi_encode_root_proof(&tree.root(), &proof)));
    Ok(())
}
