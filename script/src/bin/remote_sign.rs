//! Sign a strategy root through a JSON-RPC wallet or node.
//!
//! Usage:
//! RUST_LOG=info cargo run --bin remote-sign -- --file strategy.csv --expiration 1893456000

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::providers::ProviderBuilder;
use clap::Parser;
use strategy_lib::{encode_bundle, SignedStrategyBundle, StrategySigner};
use strategy_script::cli::{read_strategy, setup_logger, write_output, StrategyArgs};
use strategy_script::rpc::RpcSigner;
use tracing::info;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, env = "RPC_URL", default_value = "http://127.0.0.1:8545")]
    rpc_url: Url,

    /// Account to sign with; the node's first account when omitted.
    #[arg(long, env = "SIGNER_ACCOUNT")]
    account: Option<Address>,

    #[arg(long)]
    file: PathBuf,

    #[command(flatten)]
    strategy: StrategyArgs,

    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    setup_logger();

    let args = Args::parse();
    let strategy = read_strategy(&args.file)?;

    let provider = ProviderBuilder::new().connect_http(args.rpc_url.clone());
    let rpc = match args.account {
        Some(account) => RpcSigner::new(provider, account),
        None => RpcSigner::first_account(provider).await?,
    };
    let account = rpc.account();
    info!(%account, "using remote signer");

    let metadata = args.strategy.metadata(account)?;
    let typed_data = strategy.typed_data(
        &metadata,
        args.strategy.verifying_contract(),
        args.strategy.chain_id,
    );

    let signer = StrategySigner::new().with_external(Arc::new(rpc));
    let signature = signer.sign(&typed_data).await?;

    let recovered = signature.recover_address(&typed_data)?;
    if recovered != account {
        return Err(format!("signature recovers to {recovered}, expected {account}").into());
    }
    info!(root = %strategy.hex_root(), "signed strategy");

    let bundle = SignedStrategyBundle::new(typed_data, signature, strategy.leaves().to_vec());
    write_output(args.out.as_ref(), &encode_bundle(&bundle)?)?;
    Ok(())
}
