//! The per-block transform: identity checks, the single ordered fold over
//! the event path, the out-of-resources reconciliation pass, trie roots and
//! the final header.

use std::collections::{HashMap, HashSet};

use alloy::consensus::constants::EMPTY_OMMER_ROOT_HASH;
use alloy::primitives::{Address, Bloom, Bytes, B256, B64, U256};
use anyhow::{ensure, Context as _};
use log::{debug, warn};

use crate::event::{parse_event, CompletionEvent, ParsedEvent};
use crate::gas::GasLedger;
use crate::receipt::{created_contract_address, encode_receipt, ReceiptParts};
use crate::records::{BlockOutput, EthBlockHeader, EthLog, EthReceipt, StoreItem};
use crate::tries::{self, TrieInput};
use crate::txn::{decode_transaction, DecodedTxn, RejectedTxn};
use crate::{
    ChainBlockHeader, ChainReceipt, ExecutedTxn, ExecutionStatus, RawBlockInput, TxnWithReceipt,
    PENDING_BLOCK_HASH,
};

/// Revert reason marker of a transaction that exhausted the execution
/// engine's step budget. Such transactions never emit a completion event and
/// are reconstructed from the raw (transaction, receipt) pair alone.
pub(crate) const OUT_OF_RESOURCES_MARKER: &str = "RunResources has no remaining steps";

/// Block-level values resolved against the chain's system contract before
/// the transform runs.
///
/// Each value is independently substitutable: a failed view call yields the
/// documented default (zero coinbase, zero base fee, the configured gas
/// limit) without failing the block. The relay crate owns that fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockContext {
    /// Fee recipient reported by `get_coinbase`.
    pub coinbase: Address,
    /// Base fee reported by `get_base_fee`.
    pub base_fee_per_gas: u128,
    /// Block gas limit reported by `get_block_gas_limit`.
    pub gas_limit: u128,
}

/// Constant block surroundings of every per-transaction step.
struct BlockEnv<'a> {
    header: &'a ChainBlockHeader,
    system_address: U256,
    ctx: &'a BlockContext,
    pending: bool,
    /// `None` while pending; every record's `blockHash` takes this value.
    record_hash: Option<B256>,
}

/// Everything the fold carries: the produced records plus the three ordered
/// aggregations (gas ledger, block bloom, trie inputs).
#[derive(Default)]
struct Accumulator {
    items: Vec<StoreItem>,
    ledger: GasLedger,
    running_gas: u128,
    block_bloom: Bloom,
    trie_inputs: Vec<TrieInput>,
    next_log_index: u64,
    recovered: HashSet<B256>,
}

/// Transforms one block into its Ethereum-shaped records and roots.
///
/// Per-transaction problems (unrecognized calldata, bad signatures, the
/// `eth validation failed` marker) skip only that transaction. Malformed
/// block input - the two transaction lists disagreeing on identity - or a
/// trie invariant violation aborts the whole block with no partial output.
pub fn entrypoint(
    block: RawBlockInput,
    system_address: U256,
    ctx: &BlockContext,
) -> anyhow::Result<BlockOutput> {
    let RawBlockInput {
        header,
        executed,
        all_transactions,
    } = block;

    let pending = header.block_hash == PENDING_BLOCK_HASH;
    let env = BlockEnv {
        header: &header,
        system_address,
        ctx,
        pending,
        record_hash: (!pending).then_some(header.block_hash),
    };

    let index_of = index_by_hash(&all_transactions)
        .with_context(|| format!("malformed transaction list in block {}", header.block_number))?;

    let acc = executed
        .iter()
        .enumerate()
        .try_fold(Accumulator::default(), |acc, (position, triple)| {
            let hash = triple.transaction.transaction_hash;
            ensure!(
                hash == triple.receipt.transaction_hash,
                "executed transaction {hash:#x} and its receipt disagree on identity"
            );
            let index = *index_of.get(&hash).with_context(|| {
                format!(
                    "executed transaction {hash:#x} (position {position}) is missing from the \
                     full transaction list"
                )
            })?;
            executed_step(acc, triple, index, &env)
        })?;

    // Out-of-resources reverts are only visible on the raw receipts.
    let acc = all_transactions
        .iter()
        .enumerate()
        .try_fold(acc, |acc, (index, pair)| {
            if acc.recovered.contains(&pair.transaction.transaction_hash)
                || !is_out_of_resources(&pair.receipt)
            {
                return Ok(acc);
            }
            reverted_step(acc, pair, index, &env)
        })?;

    let (transactions_root, receipts_root) = tries::roots(&acc.trie_inputs)?;

    let logs_bloom = acc.block_bloom;
    let header_record = build_header(&env, &acc, transactions_root, receipts_root);
    let mut items = acc.items;
    items.push(StoreItem::Header(header_record));

    Ok(BlockOutput {
        items,
        transactions_root,
        receipts_root,
        logs_bloom,
    })
}

/// Indexes the full pair list by hash, rejecting identity disagreements and
/// duplicates (both block-fatal).
fn index_by_hash(pairs: &[TxnWithReceipt]) -> anyhow::Result<HashMap<B256, usize>> {
    let mut index_of = HashMap::with_capacity(pairs.len());
    for (index, pair) in pairs.iter().enumerate() {
        let hash = pair.transaction.transaction_hash;
        ensure!(
            hash == pair.receipt.transaction_hash,
            "transaction {hash:#x} at index {index} and its receipt disagree on identity"
        );
        ensure!(
            index_of.insert(hash, index).is_none(),
            "transaction {hash:#x} appears twice in the block"
        );
    }
    Ok(index_of)
}

/// Completion event plus decoded payload, or the reason this transaction
/// produces no output at all.
fn recognize(triple: &ExecutedTxn) -> Result<(CompletionEvent, DecodedTxn), RejectedTxn> {
    let completion = CompletionEvent::parse(&triple.event)?;
    if completion.is_validation_failure() {
        return Err(RejectedTxn::ValidationFailed);
    }
    let decoded = decode_transaction(&triple.transaction)?;
    Ok((completion, decoded))
}

fn executed_step(
    mut acc: Accumulator,
    triple: &ExecutedTxn,
    index: usize,
    env: &BlockEnv<'_>,
) -> anyhow::Result<Accumulator> {
    let hash = triple.transaction.transaction_hash;
    let (completion, decoded) = match recognize(triple) {
        Ok(it) => it,
        Err(reject) => {
            warn!(
                "block {}: skipping transaction {hash:#x}: {reject}",
                env.header.block_number
            );
            return Ok(acc);
        }
    };
    acc.recovered.insert(hash);

    let logs = triple
        .receipt
        .events
        .iter()
        .filter_map(|event| match parse_event(event, env.system_address) {
            ParsedEvent::Log(log) => Some(log),
            ParsedEvent::Rejected(reason) => {
                debug!(
                    "block {}: event from {:#x} is not a log: {reason}",
                    env.header.block_number, event.from_address
                );
                None
            }
        })
        .collect::<Vec<_>>();

    acc.running_gas += completion.gas_used;
    acc.ledger.record(index as u64, acc.running_gas);

    let parts = ReceiptParts::new(completion.success, acc.running_gas, logs);
    acc.block_bloom |= parts.logs_bloom;
    acc.trie_inputs.push(TrieInput {
        index,
        transaction: decoded.encoded(),
        receipt: encode_receipt(&decoded, &parts),
    });

    let record_index = (!env.pending).then_some(index as u64);
    let eth_logs = log_records(&mut acc, &parts, decoded.hash(), env, record_index);

    acc.items.push(StoreItem::Transaction(decoded.to_record(
        env.record_hash,
        env.header.block_number,
        record_index,
    )));
    acc.items.push(StoreItem::Receipt(EthReceipt {
        transaction_hash: decoded.hash(),
        transaction_index: record_index,
        block_hash: env.record_hash,
        block_number: Some(env.header.block_number),
        from: decoded.from,
        to: decoded.to().to().copied(),
        contract_address: created_contract_address(&decoded),
        cumulative_gas_used: acc.running_gas,
        gas_used: completion.gas_used,
        effective_gas_price: decoded.effective_gas_price(env.ctx.base_fee_per_gas),
        status: parts.status,
        logs_bloom: parts.logs_bloom,
        logs: eth_logs.clone(),
        transaction_type: decoded.tx_type(),
    }));
    acc.items.extend(eth_logs.into_iter().map(StoreItem::Log));

    Ok(acc)
}

/// Reconstructs an out-of-resources revert: zero gas used, failed status, no
/// logs; cumulative gas resolved from the ledger's nearest preceding entry.
fn reverted_step(
    mut acc: Accumulator,
    pair: &TxnWithReceipt,
    index: usize,
    env: &BlockEnv<'_>,
) -> anyhow::Result<Accumulator> {
    let hash = pair.transaction.transaction_hash;
    let decoded = match decode_transaction(&pair.transaction) {
        Ok(it) => it,
        Err(reject) => {
            warn!(
                "block {}: skipping out-of-resources transaction {hash:#x}: {reject}",
                env.header.block_number
            );
            return Ok(acc);
        }
    };

    let cumulative = acc.ledger.resolve(index as u64);
    let parts = ReceiptParts::new(false, cumulative, Vec::new());
    acc.trie_inputs.push(TrieInput {
        index,
        transaction: decoded.encoded(),
        receipt: encode_receipt(&decoded, &parts),
    });

    let record_index = (!env.pending).then_some(index as u64);
    acc.items.push(StoreItem::Transaction(decoded.to_record(
        env.record_hash,
        env.header.block_number,
        record_index,
    )));
    acc.items.push(StoreItem::Receipt(EthReceipt {
        transaction_hash: decoded.hash(),
        transaction_index: record_index,
        block_hash: env.record_hash,
        block_number: Some(env.header.block_number),
        from: decoded.from,
        to: decoded.to().to().copied(),
        // Nothing executed, so nothing was deployed.
        contract_address: None,
        cumulative_gas_used: cumulative,
        gas_used: 0,
        effective_gas_price: decoded.effective_gas_price(env.ctx.base_fee_per_gas),
        status: parts.status,
        logs_bloom: parts.logs_bloom,
        logs: Vec::new(),
        transaction_type: decoded.tx_type(),
    }));

    Ok(acc)
}

fn log_records(
    acc: &mut Accumulator,
    parts: &ReceiptParts,
    transaction_hash: B256,
    env: &BlockEnv<'_>,
    record_index: Option<u64>,
) -> Vec<EthLog> {
    parts
        .logs
        .iter()
        .map(|log| {
            let record = EthLog {
                address: log.address,
                topics: log.topics.clone(),
                data: log.data.clone(),
                block_hash: env.record_hash,
                block_number: Some(env.header.block_number),
                transaction_hash: Some(transaction_hash),
                transaction_index: record_index,
                log_index: Some(acc.next_log_index),
                removed: false,
            };
            acc.next_log_index += 1;
            record
        })
        .collect()
}

fn is_out_of_resources(receipt: &ChainReceipt) -> bool {
    matches!(receipt.execution_status, ExecutionStatus::Reverted)
        && receipt
            .revert_reason
            .as_deref()
            .is_some_and(|reason| reason.contains(OUT_OF_RESOURCES_MARKER))
}

fn build_header(
    env: &BlockEnv<'_>,
    acc: &Accumulator,
    transactions_root: B256,
    receipts_root: B256,
) -> EthBlockHeader {
    EthBlockHeader {
        hash: env.record_hash,
        parent_hash: env.header.parent_hash,
        sha3_uncles: EMPTY_OMMER_ROOT_HASH,
        miner: env.ctx.coinbase,
        state_root: env.header.new_root,
        transactions_root,
        receipts_root,
        logs_bloom: acc.block_bloom,
        difficulty: U256::ZERO,
        number: env.header.block_number,
        gas_limit: env.ctx.gas_limit,
        gas_used: acc.ledger.total(),
        timestamp: env.header.timestamp,
        extra_data: Bytes::new(),
        mix_hash: B256::ZERO,
        nonce: B64::ZERO,
        base_fee_per_gas: Some(env.ctx.base_fee_per_gas),
        withdrawals_root: None,
    }
}
