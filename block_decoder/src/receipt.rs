//! Receipt substance and its canonical trie encoding.

use alloy::consensus::{Eip658Value, Receipt, ReceiptEnvelope, ReceiptWithBloom};
use alloy::eips::eip2718::Encodable2718 as _;
use alloy::primitives::{Address, Bloom, Log, LogData, TxKind};

use crate::bloom;
use crate::event::LogContent;
use crate::txn::DecodedTxn;

/// Shared substance of one receipt, feeding both the trie value and the
/// RPC-shaped record.
#[derive(Clone, Debug)]
pub(crate) struct ReceiptParts {
    pub status: Eip658Value,
    pub cumulative_gas_used: u128,
    pub logs_bloom: Bloom,
    pub logs: Vec<LogContent>,
}

impl ReceiptParts {
    pub fn new(success: bool, cumulative_gas_used: u128, logs: Vec<LogContent>) -> Self {
        Self {
            status: Eip658Value::Eip658(success),
            cumulative_gas_used,
            logs_bloom: bloom::logs_bloom(&logs),
            logs,
        }
    }
}

/// Type-prefixed RLP of (status, cumulative gas, bloom, logs): the receipt
/// trie value. Legacy receipts carry no prefix.
pub(crate) fn encode_receipt(txn: &DecodedTxn, parts: &ReceiptParts) -> Vec<u8> {
    let receipt = Receipt {
        status: parts.status,
        cumulative_gas_used: parts.cumulative_gas_used,
        logs: parts
            .logs
            .iter()
            .map(|log| Log {
                address: log.address,
                data: LogData::new_unchecked(log.topics.clone(), log.data.clone()),
            })
            .collect(),
    };
    let with_bloom = ReceiptWithBloom {
        receipt,
        logs_bloom: parts.logs_bloom,
    };
    match txn.tx_type() {
        0 => ReceiptEnvelope::Legacy(with_bloom),
        1 => ReceiptEnvelope::Eip2930(with_bloom),
        2 => ReceiptEnvelope::Eip1559(with_bloom),
        ty => unreachable!("no receipts exist for transaction type {ty}"),
    }
    .encoded_2718()
}

/// Standard deterministic address of the contract a create deploys, from
/// (sender, nonce). `None` for plain calls.
pub(crate) fn created_contract_address(txn: &DecodedTxn) -> Option<Address> {
    matches!(txn.to(), TxKind::Create).then(|| txn.from.create(txn.nonce()))
}

#[cfg(test)]
mod tests {
    use alloy::consensus::{SignableTransaction as _, TxEip1559, TxLegacy};
    use alloy::eips::eip2718::Decodable2718 as _;
    use alloy::primitives::{Bytes, Signature, B256, U256};

    use super::*;

    fn dummy_signature() -> Signature {
        Signature::from_rs_and_parity(U256::from(1), U256::from(2), 0u64).unwrap()
    }

    fn legacy_txn(to: TxKind) -> DecodedTxn {
        let tx = TxLegacy {
            chain_id: Some(1),
            nonce: 5,
            gas_price: 1,
            gas_limit: 21_000,
            to,
            value: U256::ZERO,
            input: Bytes::new(),
        };
        DecodedTxn {
            envelope: tx
                .into_signed(
                    Signature::from_rs_and_parity(U256::from(1), U256::from(2), 37u64).unwrap(),
                )
                .into(),
            from: Address::repeat_byte(0xaa),
        }
    }

    fn fee_market_txn() -> DecodedTxn {
        let tx = TxEip1559 {
            chain_id: 1,
            nonce: 0,
            max_priority_fee_per_gas: 1,
            max_fee_per_gas: 2,
            gas_limit: 50_000,
            to: TxKind::Create,
            value: U256::ZERO,
            input: Bytes::new(),
            access_list: Default::default(),
        };
        DecodedTxn {
            envelope: tx.into_signed(dummy_signature()).into(),
            from: Address::repeat_byte(0xbb),
        }
    }

    fn parts() -> ReceiptParts {
        ReceiptParts::new(
            true,
            21_000,
            vec![LogContent {
                address: Address::repeat_byte(1),
                topics: vec![B256::repeat_byte(2)],
                data: Bytes::from_static(&[1, 2, 3]),
            }],
        )
    }

    #[test]
    fn legacy_receipts_are_unprefixed_rlp() {
        let encoded = encode_receipt(&legacy_txn(TxKind::Create), &parts());
        assert!(encoded[0] >= 0xc0, "legacy receipts have no type prefix");
        let envelope = ReceiptEnvelope::<Log>::decode_2718(&mut &encoded[..]).unwrap();
        assert_eq!(envelope.cumulative_gas_used(), 21_000);
        assert!(envelope.is_success());
    }

    #[test]
    fn fee_market_receipts_carry_their_type_prefix() {
        let encoded = encode_receipt(&fee_market_txn(), &parts());
        assert_eq!(encoded[0], 0x02);
        let envelope = ReceiptEnvelope::<Log>::decode_2718(&mut &encoded[..]).unwrap();
        assert_eq!(envelope.logs().len(), 1);
    }

    #[test]
    fn creates_derive_a_contract_address_and_calls_do_not() {
        let create = legacy_txn(TxKind::Create);
        assert_eq!(
            created_contract_address(&create),
            Some(create.from.create(5))
        );

        let call = legacy_txn(TxKind::Call(Address::repeat_byte(3)));
        assert_eq!(created_contract_address(&call), None);
    }
}
