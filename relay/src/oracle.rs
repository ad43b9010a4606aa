//! Read-only view calls against the chain's system contract.
//!
//! Three block-level values come from the chain rather than the block feed:
//! coinbase, base fee and block gas limit. Each call may fail independently;
//! [`fetch_block_context`] substitutes the documented default and keeps
//! going, so a flaky chain read never fails a block.

use std::future::Future;
use std::marker::PhantomData;
use std::num::NonZero;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use alloy::providers::Provider;
use alloy::transports::Transport;
use anyhow::{anyhow, Context as _};
use block_decoder::utils::{felt_to_address, starknet_keccak};
use block_decoder::BlockContext;
use serde_json::json;
use tokio::sync::{Mutex, Semaphore};
use tracing::warn;

const RESULT_CACHE_SIZE: usize = 1024;
// The underlying http client pools connections without bound; cap the
// number of in-flight view calls ourselves.
const MAX_PARALLEL_VIEW_CALLS: usize = 32;

/// Which block a view call reads against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockTag {
    /// A finalized block, by chain-native hash.
    Hash(B256),
    /// The pending block.
    Pending,
}

impl BlockTag {
    fn to_param(self) -> serde_json::Value {
        match self {
            Self::Hash(hash) => json!({ "block_hash": hash }),
            Self::Pending => json!("pending"),
        }
    }
}

/// The three system-contract reads the header assembler needs.
pub trait SystemOracle {
    /// `get_coinbase`: the fee recipient as a felt.
    fn coinbase(&self, block: BlockTag) -> impl Future<Output = anyhow::Result<U256>> + Send;

    /// `get_base_fee`: the block base fee in wei.
    fn base_fee(&self, block: BlockTag) -> impl Future<Output = anyhow::Result<U256>> + Send;

    /// `get_block_gas_limit`: the block gas limit.
    fn block_gas_limit(&self, block: BlockTag)
        -> impl Future<Output = anyhow::Result<U256>> + Send;
}

/// [`SystemOracle`] over an `alloy` JSON-RPC provider, issuing
/// `starknet_call` requests against the configured system contract.
///
/// Results for finalized blocks are immutable and cached.
pub struct StarknetOracle<ProviderT, TransportT> {
    provider: Arc<ProviderT>,
    system_address: U256,
    semaphore: Arc<Semaphore>,
    results: Mutex<lru::LruCache<(B256, &'static str), U256>>,
    _phantom: PhantomData<TransportT>,
}

impl<ProviderT, TransportT> std::fmt::Debug for StarknetOracle<ProviderT, TransportT> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StarknetOracle")
            .field("system_address", &self.system_address)
            .finish_non_exhaustive()
    }
}

impl<ProviderT, TransportT> StarknetOracle<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    pub fn new(provider: ProviderT, system_address: U256) -> Self {
        Self {
            provider: provider.into(),
            system_address,
            semaphore: Arc::new(Semaphore::new(MAX_PARALLEL_VIEW_CALLS)),
            results: Mutex::new(lru::LruCache::new(
                NonZero::new(RESULT_CACHE_SIZE).expect("cache size is nonzero"),
            )),
            _phantom: PhantomData,
        }
    }

    async fn view_call(&self, entrypoint: &'static str, block: BlockTag) -> anyhow::Result<U256> {
        if let BlockTag::Hash(hash) = block {
            if let Some(value) = self.results.lock().await.get(&(hash, entrypoint)) {
                return Ok(*value);
            }
        }

        let _permit = self.semaphore.acquire().await?;
        let returned: Vec<U256> = self
            .provider
            .raw_request(
                "starknet_call".into(),
                (
                    json!({
                        "contract_address": self.system_address,
                        "entry_point_selector": starknet_keccak(entrypoint.as_bytes()),
                        "calldata": Vec::<U256>::new(),
                    }),
                    block.to_param(),
                ),
            )
            .await
            .with_context(|| format!("starknet_call {entrypoint} failed"))?;

        let value = *returned
            .first()
            .with_context(|| format!("starknet_call {entrypoint} returned no felts"))?;

        if let BlockTag::Hash(hash) = block {
            self.results.lock().await.put((hash, entrypoint), value);
        }
        Ok(value)
    }
}

impl<ProviderT, TransportT> SystemOracle for StarknetOracle<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    async fn coinbase(&self, block: BlockTag) -> anyhow::Result<U256> {
        self.view_call("get_coinbase", block).await
    }

    async fn base_fee(&self, block: BlockTag) -> anyhow::Result<U256> {
        self.view_call("get_base_fee", block).await
    }

    async fn block_gas_limit(&self, block: BlockTag) -> anyhow::Result<U256> {
        self.view_call("get_block_gas_limit", block).await
    }
}

/// Resolves the [`BlockContext`] for one block: the three view calls run
/// concurrently, and each failure is logged and replaced by its default
/// (zero coinbase, zero base fee, `default_gas_limit`).
pub async fn fetch_block_context(
    oracle: &impl SystemOracle,
    block: BlockTag,
    default_gas_limit: u128,
) -> BlockContext {
    let (coinbase, base_fee, gas_limit) = tokio::join!(
        oracle.coinbase(block),
        oracle.base_fee(block),
        oracle.block_gas_limit(block),
    );

    BlockContext {
        coinbase: match coinbase {
            Ok(felt) => felt_to_address(felt),
            Err(err) => {
                warn!("get_coinbase failed, using the zero address: {err:#}");
                Address::ZERO
            }
        },
        base_fee_per_gas: or_default(base_fee, "get_base_fee", 0),
        gas_limit: or_default(gas_limit, "get_block_gas_limit", default_gas_limit),
    }
}

fn or_default(result: anyhow::Result<U256>, entrypoint: &str, default: u128) -> u128 {
    let narrowed = result.and_then(|felt| {
        u128::try_from(felt).map_err(|_| anyhow!("returned felt exceeds 128 bits"))
    });
    match narrowed {
        Ok(value) => value,
        Err(err) => {
            warn!("{entrypoint} failed, using default {default}: {err:#}");
            default
        }
    }
}
