//! The Ethereum-shaped records this pipeline emits.
//!
//! These are JSON-RPC-shaped *storage* projections, not wire types: the sink
//! persists them and the serving layer reads them back verbatim. Block
//! linkage fields (`blockHash`, `transactionIndex`, and the header's own
//! `hash`) are `None` while the block is pending.

use alloy::consensus::Eip658Value;
use alloy::eips::eip2930::AccessList;
use alloy::primitives::{Address, Bloom, Bytes, B256, B64, U256};
use serde::{Deserialize, Serialize};

/// A tagged output record; the pipeline's only externally visible artifact
/// besides the trie roots and the block bloom on [`BlockOutput`].
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreItem {
    /// An Ethereum-shaped transaction.
    Transaction(EthTransaction),
    /// An Ethereum-shaped receipt.
    Receipt(EthReceipt),
    /// An Ethereum-shaped log.
    Log(EthLog),
    /// The re-derived block header.
    Header(EthBlockHeader),
}

/// Everything [`entrypoint`](crate::entrypoint) produces for one block.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BlockOutput {
    /// Ordered records: per transaction its record, receipt and logs, with
    /// the header last.
    pub items: Vec<StoreItem>,
    /// Root of the transaction trie over every inserted transaction.
    pub transactions_root: B256,
    /// Root of the receipt trie over every inserted receipt.
    pub receipts_root: B256,
    /// OR of every receipt's bloom.
    pub logs_bloom: Bloom,
}

/// JSON-RPC-shaped projection of a decoded typed transaction.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EthTransaction {
    /// Ethereum transaction hash (keccak of the canonical serialization).
    pub hash: B256,
    /// Account nonce.
    pub nonce: u64,
    /// Containing block hash; `None` while pending.
    pub block_hash: Option<B256>,
    /// Containing block number.
    pub block_number: Option<u64>,
    /// Position within the block; `None` while pending.
    pub transaction_index: Option<u64>,
    /// Recovered signer.
    pub from: Address,
    /// Destination; `None` for contract creation.
    pub to: Option<Address>,
    /// Transferred value in wei.
    pub value: U256,
    /// Gas limit.
    pub gas: u128,
    /// Gas price (legacy and EIP-2930 transactions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u128>,
    /// EIP-1559 fee cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<u128>,
    /// EIP-1559 priority fee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<u128>,
    /// Call input data.
    pub input: Bytes,
    /// Signature `r`.
    pub r: U256,
    /// Signature `s`.
    pub s: U256,
    /// Signature `v`: the full EIP-155 value for legacy transactions, the
    /// recovery id for typed ones.
    pub v: U256,
    /// Recovery id, surfaced separately for typed transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_parity: Option<bool>,
    /// Chain id; for legacy transactions derived from `v`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Access list (EIP-2930 and EIP-1559 transactions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<AccessList>,
    /// Transaction type tag (0, 1 or 2).
    #[serde(rename = "type")]
    pub transaction_type: u8,
}

/// JSON-RPC-shaped projection of a transaction receipt.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EthReceipt {
    /// Ethereum transaction hash.
    pub transaction_hash: B256,
    /// Position within the block; `None` while pending.
    pub transaction_index: Option<u64>,
    /// Containing block hash; `None` while pending.
    pub block_hash: Option<B256>,
    /// Containing block number.
    pub block_number: Option<u64>,
    /// Recovered signer.
    pub from: Address,
    /// Destination; `None` for contract creation.
    pub to: Option<Address>,
    /// Deterministically derived address of a created contract.
    pub contract_address: Option<Address>,
    /// Gas consumed by the block up to and including this transaction.
    pub cumulative_gas_used: u128,
    /// Gas consumed by this transaction alone.
    pub gas_used: u128,
    /// Effective price paid per unit of gas.
    pub effective_gas_price: u128,
    /// Post-transaction status flag.
    pub status: Eip658Value,
    /// Bloom over this receipt's logs.
    pub logs_bloom: Bloom,
    /// The logs this transaction emitted.
    pub logs: Vec<EthLog>,
    /// Transaction type tag (0, 1 or 2).
    #[serde(rename = "type")]
    pub transaction_type: u8,
}

/// JSON-RPC-shaped projection of a log.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EthLog {
    /// Address the log was emitted for.
    pub address: Address,
    /// Up to four indexed topics.
    pub topics: Vec<B256>,
    /// Unindexed payload bytes.
    pub data: Bytes,
    /// Containing block hash; `None` while pending.
    pub block_hash: Option<B256>,
    /// Containing block number.
    pub block_number: Option<u64>,
    /// Hash of the emitting transaction.
    pub transaction_hash: Option<B256>,
    /// Position of the emitting transaction; `None` while pending.
    pub transaction_index: Option<u64>,
    /// Position among all logs of the block.
    pub log_index: Option<u64>,
    /// Always `false`; this chain does not reorg emitted records.
    pub removed: bool,
}

/// The re-derived Ethereum block header.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EthBlockHeader {
    /// Block hash; `None` while pending.
    pub hash: Option<B256>,
    /// Parent block hash.
    pub parent_hash: B256,
    /// Canonical empty-list hash; the chain has no ommers.
    pub sha3_uncles: B256,
    /// Coinbase reported by the system contract.
    pub miner: Address,
    /// State commitment after this block.
    pub state_root: B256,
    /// Recomputed transaction trie root.
    pub transactions_root: B256,
    /// Recomputed receipt trie root.
    pub receipts_root: B256,
    /// Aggregated block bloom.
    pub logs_bloom: Bloom,
    /// Always zero.
    pub difficulty: U256,
    /// Block height.
    pub number: u64,
    /// Gas limit reported by the system contract.
    pub gas_limit: u128,
    /// Total gas consumed by the block's executed transactions.
    pub gas_used: u128,
    /// Unix timestamp of the block.
    pub timestamp: u64,
    /// Always empty.
    pub extra_data: Bytes,
    /// Always zero.
    pub mix_hash: B256,
    /// Always zero.
    pub nonce: B64,
    /// Base fee reported by the system contract.
    pub base_fee_per_gas: Option<u128>,
    /// Always absent; the chain has no withdrawals.
    pub withdrawals_root: Option<B256>,
}
