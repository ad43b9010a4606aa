use std::path::PathBuf;

use alloy::primitives::U256;
use clap::{Parser, Subcommand, ValueHint};
use url::Url;

/// relay config
#[derive(Parser)]
#[command(version, propagate_version = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Reads block inputs from stdin and writes store records out.
    Stdio {
        /// The chain RPC URL used for system-contract view calls.
        #[arg(short = 'u', long, env = "RELAY_RPC_URL", value_hint = ValueHint::Url)]
        rpc_url: Url,
        /// Address (felt) of the system contract on the chain.
        #[arg(long, env = "RELAY_SYSTEM_ADDRESS")]
        system_address: U256,
        /// Gas limit substituted when the chain's gas limit view call fails.
        #[arg(long, env = "RELAY_DEFAULT_GAS_LIMIT", default_value_t = 30_000_000)]
        default_gas_limit: u128,
        /// First block to process; earlier feed entries are skipped.
        #[arg(short = 's', long, env = "RELAY_START_BLOCK", default_value_t = 0)]
        start_block: u64,
        /// Directory for per-block record files; stdout when omitted.
        #[arg(short, long, env = "RELAY_OUTPUT_DIR", value_hint = ValueHint::DirPath)]
        output_dir: Option<PathBuf>,
    },
}
