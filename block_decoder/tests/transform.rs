//! Whole-block transforms against hand-built chain fixtures.

use alloy::consensus::constants::EMPTY_ROOT_HASH;
use alloy::consensus::{
    Eip658Value, Receipt, ReceiptEnvelope, ReceiptWithBloom, SignableTransaction as _, TxEnvelope,
    TxLegacy,
};
use alloy::eips::eip2718::Encodable2718 as _;
use alloy::primitives::{address, b256, Bytes, Log, LogData, TxKind, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync as _;
use block_decoder::packing::pack;
use block_decoder::records::{EthBlockHeader, EthReceipt, StoreItem};
use block_decoder::tries::{ReceiptTrie, TransactionTrie};
use block_decoder::utils::starknet_keccak;
use block_decoder::{
    entrypoint, BlockContext, ChainBlockHeader, ChainEvent, ChainReceipt, ChainTransaction,
    ExecutedTxn, ExecutionStatus, RawBlockInput, TxnWithReceipt, PENDING_BLOCK_HASH,
};

const CHAIN_ID: u64 = 1;

fn system_address() -> U256 {
    U256::from(0x4b4bu64)
}

fn context() -> BlockContext {
    BlockContext {
        coinbase: address!("00000000000000000000000000000000000c0ffe"),
        base_fee_per_gas: 1_000_000_000,
        gas_limit: 30_000_000,
    }
}

fn signer() -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&b256!(
        "4c0883a69102937d6231471b5dbb6204fe512961708279feb1be6ae5538da033"
    ))
    .unwrap()
}

fn legacy_tx(nonce: u64) -> TxLegacy {
    TxLegacy {
        chain_id: Some(CHAIN_ID),
        nonce,
        gas_price: 20_000_000_000,
        gas_limit: 21_000,
        to: TxKind::Call(address!("3535353535353535353535353535353535353535")),
        value: U256::from(1_000),
        input: Bytes::new(),
    }
}

/// Signs `tx` and wraps its signing preimage into the chain's execute shape.
fn chain_transaction(tx: &TxLegacy, chain_hash: B256) -> (ChainTransaction, TxEnvelope) {
    let signature = signer().sign_hash_sync(&tx.signature_hash()).unwrap();
    let v = 35 + 2 * CHAIN_ID + signature.v().y_parity() as u64;

    let payload = tx.encoded_for_signing();
    let words = pack(&payload);
    let mask = (U256::from(1) << 128) - U256::from(1);

    let mut calldata = vec![
        U256::from(1),
        U256::from(0xaccu64),
        U256::from(0xe8ec), // execute selector
        U256::ZERO,
        U256::from(payload.len()),
        U256::from(words.len()),
    ];
    calldata.extend(words.iter().map(|word| U256::from_be_bytes(word.0)));

    let envelope: TxEnvelope = tx
        .clone()
        .into_signed(
            alloy::primitives::Signature::from_rs_and_parity(signature.r(), signature.s(), v)
                .unwrap(),
        )
        .into();

    (
        ChainTransaction {
            transaction_hash: chain_hash,
            sender_address: U256::from(0xaccu64),
            calldata,
            signature: vec![
                signature.r() & mask,
                signature.r() >> 128,
                signature.s() & mask,
                signature.s() >> 128,
                U256::from(v),
            ],
        },
        envelope,
    )
}

fn completion_event(response: &[U256], success: bool, gas_used: u64) -> ChainEvent {
    let mut data = Vec::new();
    if !response.is_empty() {
        data.push(U256::from(response.len()));
        data.extend_from_slice(response);
    }
    data.push(U256::from(success as u64));
    data.push(U256::from(gas_used));
    ChainEvent {
        from_address: system_address(),
        keys: vec![starknet_keccak(b"transaction_executed")],
        data,
    }
}

fn log_event(address: u64, topic: (u64, u64), data: &[u8]) -> ChainEvent {
    ChainEvent {
        from_address: system_address(),
        keys: vec![
            U256::from(address),
            U256::from(topic.0),
            U256::from(topic.1),
        ],
        data: data.iter().map(|byte| U256::from(*byte)).collect(),
    }
}

fn header(block_hash: B256) -> ChainBlockHeader {
    ChainBlockHeader {
        block_number: 413,
        block_hash,
        parent_hash: b256!("0202020202020202020202020202020202020202020202020202020202020202"),
        new_root: b256!("0303030303030303030303030303030303030303030303030303030303030303"),
        timestamp: 1_717_000_000,
        sequencer_address: U256::from(9),
    }
}

fn receipt_for(transaction: &ChainTransaction, events: Vec<ChainEvent>) -> ChainReceipt {
    ChainReceipt {
        transaction_hash: transaction.transaction_hash,
        execution_status: ExecutionStatus::Succeeded,
        revert_reason: None,
        events,
    }
}

fn count_kinds(items: &[StoreItem]) -> (usize, usize, usize, usize) {
    items.iter().fold((0, 0, 0, 0), |mut counts, item| {
        match item {
            StoreItem::Transaction(_) => counts.0 += 1,
            StoreItem::Receipt(_) => counts.1 += 1,
            StoreItem::Log(_) => counts.2 += 1,
            StoreItem::Header(_) => counts.3 += 1,
        }
        counts
    })
}

fn receipts(items: &[StoreItem]) -> Vec<&EthReceipt> {
    items
        .iter()
        .filter_map(|item| match item {
            StoreItem::Receipt(receipt) => Some(receipt),
            _ => None,
        })
        .collect()
}

fn the_header(items: &[StoreItem]) -> &EthBlockHeader {
    let Some(StoreItem::Header(header)) = items.last() else {
        panic!("the header must be the last record");
    };
    header
}

#[test]
fn single_legacy_transaction_with_two_logs() {
    let block_hash =
        b256!("2222222222222222222222222222222222222222222222222222222222222222");
    let chain_hash =
        b256!("0101010101010101010101010101010101010101010101010101010101010101");

    let tx = legacy_tx(0);
    let (chain_txn, envelope) = chain_transaction(&tx, chain_hash);
    let completion = completion_event(&[], true, 21_000);
    let events = vec![
        log_event(0x1111, (1, 2), b"first"),
        completion.clone(), // bookkeeping events never become logs
        log_event(0x2222, (3, 4), b"second"),
    ];
    let receipt = receipt_for(&chain_txn, events);

    let input = RawBlockInput {
        header: header(block_hash),
        executed: vec![ExecutedTxn {
            transaction: chain_txn.clone(),
            receipt: receipt.clone(),
            event: completion,
        }],
        all_transactions: vec![TxnWithReceipt {
            transaction: chain_txn,
            receipt,
        }],
    };

    let output = entrypoint(input, system_address(), &context()).unwrap();
    assert_eq!(count_kinds(&output.items), (1, 1, 2, 1));

    let receipt = receipts(&output.items)[0];
    assert_eq!(receipt.status, Eip658Value::Eip658(true));
    assert_eq!(receipt.cumulative_gas_used, 21_000);
    assert_eq!(receipt.gas_used, 21_000);
    assert_eq!(receipt.effective_gas_price, 20_000_000_000);
    assert_eq!(receipt.from, signer().address());

    let log_indices = output
        .items
        .iter()
        .filter_map(|item| match item {
            StoreItem::Log(log) => log.log_index,
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(log_indices, vec![0, 1]);

    let header = the_header(&output.items);
    assert_eq!(header.hash, Some(block_hash));
    assert_eq!(header.gas_used, 21_000);
    assert_eq!(header.miner, context().coinbase);
    assert_eq!(header.transactions_root, output.transactions_root);
    assert_eq!(header.receipts_root, output.receipts_root);
    assert_eq!(header.logs_bloom, output.logs_bloom);

    // The roots must verify against independently rebuilt tries.
    let consensus_receipt = ReceiptEnvelope::Legacy(ReceiptWithBloom {
        receipt: Receipt {
            status: Eip658Value::Eip658(true),
            cumulative_gas_used: 21_000,
            logs: output
                .items
                .iter()
                .filter_map(|item| match item {
                    StoreItem::Log(log) => Some(Log {
                        address: log.address,
                        data: LogData::new_unchecked(log.topics.clone(), log.data.clone()),
                    }),
                    _ => None,
                })
                .collect(),
        },
        logs_bloom: receipt.logs_bloom,
    });

    let mut transactions = TransactionTrie::new();
    transactions.insert(0, &envelope.encoded_2718()).unwrap();
    assert_eq!(transactions.root().unwrap(), output.transactions_root);

    let mut receipts = ReceiptTrie::new();
    receipts.insert(0, &consensus_receipt.encoded_2718()).unwrap();
    assert_eq!(receipts.root().unwrap(), output.receipts_root);
}

#[test]
fn validation_failed_transactions_vanish() {
    let chain_hash =
        b256!("0404040404040404040404040404040404040404040404040404040404040404");
    let (chain_txn, _) = chain_transaction(&legacy_tx(0), chain_hash);

    let marker = "eth validation failed"
        .bytes()
        .map(U256::from)
        .collect::<Vec<_>>();
    let completion = completion_event(&marker, false, 0);
    let receipt = receipt_for(&chain_txn, vec![completion.clone()]);

    let input = RawBlockInput {
        header: header(b256!(
            "2222222222222222222222222222222222222222222222222222222222222222"
        )),
        executed: vec![ExecutedTxn {
            transaction: chain_txn.clone(),
            receipt: receipt.clone(),
            event: completion,
        }],
        all_transactions: vec![TxnWithReceipt {
            transaction: chain_txn,
            receipt,
        }],
    };

    let output = entrypoint(input, system_address(), &context()).unwrap();
    assert_eq!(count_kinds(&output.items), (0, 0, 0, 1));
    assert_eq!(output.transactions_root, EMPTY_ROOT_HASH);
    assert_eq!(output.receipts_root, EMPTY_ROOT_HASH);
    assert_eq!(the_header(&output.items).gas_used, 0);
}

#[test]
fn pending_blocks_null_linkage_fields() {
    let chain_hash =
        b256!("0505050505050505050505050505050505050505050505050505050505050505");
    let (chain_txn, _) = chain_transaction(&legacy_tx(0), chain_hash);
    let completion = completion_event(&[], true, 21_000);
    let receipt = receipt_for(
        &chain_txn,
        vec![log_event(0x1111, (1, 2), b"pending"), completion.clone()],
    );

    let input = RawBlockInput {
        header: header(PENDING_BLOCK_HASH),
        executed: vec![ExecutedTxn {
            transaction: chain_txn.clone(),
            receipt: receipt.clone(),
            event: completion,
        }],
        all_transactions: vec![TxnWithReceipt {
            transaction: chain_txn,
            receipt,
        }],
    };

    let output = entrypoint(input, system_address(), &context()).unwrap();
    assert_eq!(count_kinds(&output.items), (1, 1, 1, 1));

    for item in &output.items {
        match item {
            StoreItem::Transaction(tx) => {
                assert_eq!(tx.block_hash, None);
                assert_eq!(tx.transaction_index, None);
                assert_eq!(tx.block_number, Some(413));
            }
            StoreItem::Receipt(receipt) => {
                assert_eq!(receipt.block_hash, None);
                assert_eq!(receipt.transaction_index, None);
                // Internal computation still ran with real values.
                assert_eq!(receipt.cumulative_gas_used, 21_000);
            }
            StoreItem::Log(log) => {
                assert_eq!(log.block_hash, None);
                assert_eq!(log.transaction_index, None);
                assert_eq!(log.log_index, Some(0));
            }
            StoreItem::Header(header) => {
                assert_eq!(header.hash, None);
                assert_ne!(header.transactions_root, EMPTY_ROOT_HASH);
            }
        }
    }
}

#[test]
fn out_of_resources_reverts_are_reconstructed() {
    let hash_a = b256!("0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a");
    let hash_b = b256!("0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b");

    let (txn_a, envelope_a) = chain_transaction(&legacy_tx(0), hash_a);
    let (txn_b, envelope_b) = chain_transaction(&legacy_tx(1), hash_b);

    let completion = completion_event(&[], true, 30_000);
    let receipt_a = receipt_for(&txn_a, vec![completion.clone()]);
    let receipt_b = ChainReceipt {
        transaction_hash: hash_b,
        execution_status: ExecutionStatus::Reverted,
        revert_reason: Some(
            "Transaction execution has failed: RunResources has no remaining steps".into(),
        ),
        events: Vec::new(),
    };

    let input = RawBlockInput {
        header: header(b256!(
            "2222222222222222222222222222222222222222222222222222222222222222"
        )),
        executed: vec![ExecutedTxn {
            transaction: txn_a.clone(),
            receipt: receipt_a.clone(),
            event: completion,
        }],
        all_transactions: vec![
            TxnWithReceipt {
                transaction: txn_a,
                receipt: receipt_a,
            },
            TxnWithReceipt {
                transaction: txn_b,
                receipt: receipt_b,
            },
        ],
    };

    let output = entrypoint(input, system_address(), &context()).unwrap();
    assert_eq!(count_kinds(&output.items), (2, 2, 0, 1));

    let all = receipts(&output.items);
    let reverted = all
        .iter()
        .find(|receipt| receipt.transaction_index == Some(1))
        .unwrap();
    assert_eq!(reverted.status, Eip658Value::Eip658(false));
    assert_eq!(reverted.gas_used, 0);
    assert_eq!(reverted.cumulative_gas_used, 30_000, "nearest preceding ledger entry");
    assert_eq!(the_header(&output.items).gas_used, 30_000);

    // Both transactions must be in the trie before the root is read.
    let mut transactions = TransactionTrie::new();
    transactions.insert(0, &envelope_a.encoded_2718()).unwrap();
    transactions.insert(1, &envelope_b.encoded_2718()).unwrap();
    assert_eq!(transactions.root().unwrap(), output.transactions_root);
}

#[test]
fn disagreeing_transaction_lists_abort_the_block() {
    let chain_hash =
        b256!("0606060606060606060606060606060606060606060606060606060606060606");
    let (chain_txn, _) = chain_transaction(&legacy_tx(0), chain_hash);
    let completion = completion_event(&[], true, 21_000);
    let mut receipt = receipt_for(&chain_txn, vec![completion.clone()]);
    receipt.transaction_hash =
        b256!("0707070707070707070707070707070707070707070707070707070707070707");

    let input = RawBlockInput {
        header: header(b256!(
            "2222222222222222222222222222222222222222222222222222222222222222"
        )),
        executed: Vec::new(),
        all_transactions: vec![TxnWithReceipt {
            transaction: chain_txn,
            receipt,
        }],
    };

    let err = entrypoint(input, system_address(), &context()).unwrap_err();
    assert!(err.to_string().contains("malformed transaction list"));
}
