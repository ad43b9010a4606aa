use std::io;
use std::path::PathBuf;

use alloy::primitives::U256;
use alloy::providers::ProviderBuilder;
use anyhow::Result;
use clap::Parser;
use relay::env::load_dotenvy_vars_if_present;
use relay::feed;
use relay::oracle::{fetch_block_context, BlockTag, StarknetOracle, SystemOracle};
use relay::sink::{JsonDirSink, StdoutSink, StoreSink};
use tracing::info;
use url::Url;

#[path = "relay/cli.rs"]
mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenvy_vars_if_present();
    relay::tracing::init();

    let args = cli::Cli::parse();
    match args.command {
        cli::Command::Stdio {
            rpc_url,
            system_address,
            default_gas_limit,
            start_block,
            output_dir,
        } => {
            stdio_main(
                rpc_url,
                system_address,
                default_gas_limit,
                start_block,
                output_dir,
            )
            .await
        }
    }
}

async fn stdio_main(
    rpc_url: Url,
    system_address: U256,
    default_gas_limit: u128,
    start_block: u64,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let provider = ProviderBuilder::new().on_http(rpc_url);
    let oracle = StarknetOracle::new(provider, system_address);

    match output_dir {
        Some(dir) => {
            relay_blocks(
                &oracle,
                &mut JsonDirSink::new(dir),
                system_address,
                default_gas_limit,
                start_block,
            )
            .await
        }
        None => {
            relay_blocks(
                &oracle,
                &mut StdoutSink,
                system_address,
                default_gas_limit,
                start_block,
            )
            .await
        }
    }
}

/// Drives the feed: resolve the block context, transform, commit.
///
/// A failed transform aborts the run with no partial output for that block;
/// the caller re-feeds the block to retry.
async fn relay_blocks(
    oracle: &impl SystemOracle,
    sink: &mut impl StoreSink,
    system_address: U256,
    default_gas_limit: u128,
    start_block: u64,
) -> Result<()> {
    let stdin = io::stdin();
    for block in feed::read_blocks(stdin.lock()) {
        let block = block?;
        let number = block.header.block_number;
        if number < start_block {
            continue;
        }

        let tag = if block.header.block_hash == block_decoder::PENDING_BLOCK_HASH {
            BlockTag::Pending
        } else {
            BlockTag::Hash(block.header.block_hash)
        };
        let ctx = fetch_block_context(oracle, tag, default_gas_limit).await;

        let output = block_decoder::entrypoint(block, system_address, &ctx)?;
        info!(
            "block {number}: {} records, transactions root {}, receipts root {}",
            output.items.len(),
            output.transactions_root,
            output.receipts_root
        );
        sink.commit(number, &output.items).await?;
    }
    Ok(())
}
