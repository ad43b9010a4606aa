//! Your CairoVM-based chain executes EVM transactions wrapped inside
//! account-abstraction calls, and none of its blocks look like Ethereum
//! blocks.
//!
//! But your users want to point an unmodified Ethereum JSON-RPC client at it.
//!
//! This library re-derives the Ethereum shape of a block: given one block's
//! header, its transaction/receipt/event feed and a [`BlockContext`] resolved
//! from the chain's system contract, [`entrypoint`] produces the
//! [`StoreItem`](records::StoreItem) records (transactions, receipts, logs,
//! header) together with the transaction/receipt trie roots and the block
//! bloom that summarize them.
//!
//! # Non-Goals
//! - Consensus and EVM execution semantics - blocks arrive already executed.
//! - Fee-market economics - gas values are reconstructed, never recomputed.
//!
//! The broad pipeline is:
//!
//! 1. [`packing`] unpacks the chain's 31-byte-aligned calldata encoding.
//! 2. [`txn`](self) rebuilds the tagged Ethereum transaction (legacy,
//!    EIP-2930, EIP-1559) from the unpacked payload and the out-of-band
//!    signature felts.
//! 3. [`event`](self) classifies contract events into Ethereum logs or a
//!    rejection reason, and decodes `transaction_executed` completion events.
//! 4. [`core`](self) folds the block's transactions through the gas ledger,
//!    the bloom aggregator and the trie builder, and assembles the header.

#![deny(rustdoc::broken_intra_doc_links)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]

pub mod packing;
pub mod records;
pub mod tries;
pub mod utils;

mod bloom;
mod core;
mod event;
mod gas;
mod receipt;
mod txn;

use alloy::primitives::{B256, U256};
use serde::{Deserialize, Serialize};

pub use crate::core::{entrypoint, BlockContext};

/// Hash value reserved for blocks that are not yet finalized.
///
/// A block carrying this hash is *pending*: every `blockHash` and
/// `transactionIndex` field in its produced records is nulled.
pub const PENDING_BLOCK_HASH: B256 = B256::ZERO;

/// Core payload needed to transform one block.
///
/// Both transaction lists are views over the same underlying block: wherever
/// they overlap they must agree on transaction identity (hash), otherwise the
/// whole block transform is aborted.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RawBlockInput {
    /// The chain-native header fields of the block.
    pub header: ChainBlockHeader,

    /// Transactions that emitted a `transaction_executed` completion event,
    /// in block order, each paired with its receipt and that event.
    pub executed: Vec<ExecutedTxn>,

    /// Every transaction of the block with its receipt, in block order.
    /// Used to recover transactions that reverted before emitting a
    /// completion event.
    pub all_transactions: Vec<TxnWithReceipt>,
}

/// Header fields the chain natively produces for a block.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChainBlockHeader {
    /// Block height.
    pub block_number: u64,
    /// Chain-native block hash; [`PENDING_BLOCK_HASH`] while pending.
    pub block_hash: B256,
    /// Hash of the parent block.
    pub parent_hash: B256,
    /// State commitment after this block.
    pub new_root: B256,
    /// Unix timestamp of the block.
    pub timestamp: u64,
    /// Address of the sequencer that built the block.
    pub sequencer_address: U256,
}

/// One transaction that completed execution, with the receipt that carries
/// its events and the `transaction_executed` event that marks it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ExecutedTxn {
    /// The outer account-abstraction call.
    pub transaction: ChainTransaction,
    /// The chain receipt for that call.
    pub receipt: ChainReceipt,
    /// The completion event emitted by the system contract.
    pub event: ChainEvent,
}

/// A raw (transaction, receipt) pair from the full block listing.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TxnWithReceipt {
    /// The outer account-abstraction call.
    pub transaction: ChainTransaction,
    /// The chain receipt for that call.
    pub receipt: ChainReceipt,
}

/// The chain-native view of a transaction: an `execute` wrapper whose
/// calldata embeds the packed Ethereum payload.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChainTransaction {
    /// Chain-native transaction hash.
    pub transaction_hash: B256,
    /// The account contract that submitted the call.
    pub sender_address: U256,
    /// Argument array of the outer `execute` call.
    #[serde(default)]
    pub calldata: Vec<U256>,
    /// Out-of-band signature felts: `[r_low, r_high, s_low, s_high, v]`.
    #[serde(default)]
    pub signature: Vec<U256>,
}

/// The chain-native receipt of a transaction.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChainReceipt {
    /// Chain-native transaction hash; must match the transaction's.
    pub transaction_hash: B256,
    /// Whether the chain executed the call to completion.
    pub execution_status: ExecutionStatus,
    /// Chain-side revert reason, when reverted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    /// Events the call emitted, in emission order.
    #[serde(default)]
    pub events: Vec<ChainEvent>,
}

/// Chain-side execution status of a receipt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// The call ran to completion.
    Succeeded,
    /// The call reverted at the chain level.
    Reverted,
}

/// One raw contract event: keys and data are felts.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ChainEvent {
    /// The contract that emitted the event.
    pub from_address: U256,
    /// Event keys; `keys[0]` selects the event kind or carries a log address.
    #[serde(default)]
    pub keys: Vec<U256>,
    /// Event payload felts.
    #[serde(default)]
    pub data: Vec<U256>,
}
