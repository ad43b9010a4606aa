//! Rebuilds tagged Ethereum transactions out of the chain's
//! account-abstraction `execute` wrapper.
//!
//! The wrapper's calldata carries the transaction's *signing* encoding (the
//! EIP-155 preimage for legacy, the type-prefixed unsigned field list for
//! EIP-2930/EIP-1559), packed through [`crate::packing`]. The real secp256k1
//! signature travels out-of-band as five felts. Neither shape is accepted by
//! a signed-transaction decoder, so the field lists are decoded explicitly.

use std::cmp;

use alloy::consensus::{SignableTransaction as _, TxEip1559, TxEip2930, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718 as _;
use alloy::eips::eip2930::AccessList;
use alloy::primitives::{
    Address, Bytes, Parity, Signature, SignatureError, TxKind, B256, U256,
};
use alloy::rlp::{Decodable, Header as RlpHeader};
use thiserror::Error;

use crate::packing::{self, UnpackError};
use crate::records::EthTransaction;
use crate::ChainTransaction;

const EIP2930_TYPE: u8 = 0x01;
const EIP1559_TYPE: u8 = 0x02;

/// Why a transaction was skipped. Never fatal to the block.
#[derive(Debug, Error)]
pub(crate) enum RejectedTxn {
    #[error("multi-call execute wrapper ({0} calls)")]
    MultiCall(U256),
    #[error("missing or truncated execute calldata")]
    MissingCalldata,
    #[error("calldata declares {declared} packed words but carries {got}")]
    FrameMismatch { declared: usize, got: usize },
    #[error(transparent)]
    Unpack(#[from] UnpackError),
    #[error("empty transaction payload")]
    EmptyPayload,
    #[error("signature must be 5 field elements, got {0}")]
    SignatureArity(usize),
    #[error("signature half wider than 128 bits")]
    WideSignatureHalf,
    #[error("signature v does not fit in 64 bits")]
    WideRecoveryId,
    #[error("legacy transaction v={0} predates eip-155")]
    PreEip155(u64),
    #[error("recovery id {0} out of range")]
    BadRecoveryId(u64),
    #[error("unsupported transaction type {0:#04x}")]
    UnsupportedType(u8),
    #[error("transaction payload rlp: {0}")]
    Payload(alloy::rlp::Error),
    #[error("signature rejected: {0}")]
    Signature(#[from] SignatureError),
    #[error("malformed transaction_executed event: {0}")]
    MalformedCompletion(&'static str),
    #[error("eth validation failed")]
    ValidationFailed,
}

/// A transaction the decoder recognized, with its recovered signer.
#[derive(Clone, Debug)]
pub(crate) struct DecodedTxn {
    pub envelope: TxEnvelope,
    pub from: Address,
}

/// Decodes the wrapped payload and applies the out-of-band signature.
pub(crate) fn decode_transaction(txn: &ChainTransaction) -> Result<DecodedTxn, RejectedTxn> {
    let payload = unwrap_execute_call(&txn.calldata)?;
    let (r, s, v) = split_signature(&txn.signature)?;

    let envelope: TxEnvelope = match payload.first().copied() {
        None => return Err(RejectedTxn::EmptyPayload),
        Some(EIP2930_TYPE) => {
            let tx = decode_eip2930(&payload[1..]).map_err(RejectedTxn::Payload)?;
            tx.into_signed(recovery_signature(r, s, v)?).into()
        }
        Some(EIP1559_TYPE) => {
            let tx = decode_eip1559(&payload[1..]).map_err(RejectedTxn::Payload)?;
            tx.into_signed(recovery_signature(r, s, v)?).into()
        }
        Some(ty) if ty <= 0x7f => return Err(RejectedTxn::UnsupportedType(ty)),
        Some(_) => {
            if v < 35 {
                return Err(RejectedTxn::PreEip155(v));
            }
            let mut tx = decode_legacy(&payload).map_err(RejectedTxn::Payload)?;
            tx.chain_id = Some((v - 35) / 2);
            // v >= 35 maps to an eip-155 parity.
            let signature = Signature::from_rs_and_parity(r, s, v)?;
            tx.into_signed(signature).into()
        }
    };

    let from = match &envelope {
        TxEnvelope::Legacy(signed) => signed.recover_signer(),
        TxEnvelope::Eip2930(signed) => signed.recover_signer(),
        TxEnvelope::Eip1559(signed) => signed.recover_signer(),
        _ => unreachable!("the decoder only produces legacy, eip-2930 and eip-1559 envelopes"),
    }?;

    Ok(DecodedTxn { envelope, from })
}

/// Strips the `execute` framing and unpacks the payload bytes.
///
/// Layout: `[call_count, to, selector, data_offset, data_byte_len,
/// word_count, words..]`. Anything other than a single call is not a
/// recognized transaction.
fn unwrap_execute_call(calldata: &[U256]) -> Result<Vec<u8>, RejectedTxn> {
    let Some((&call_count, frame)) = calldata.split_first() else {
        return Err(RejectedTxn::MissingCalldata);
    };
    if call_count != U256::from(1) {
        return Err(RejectedTxn::MultiCall(call_count));
    }
    if frame.len() < 5 {
        return Err(RejectedTxn::MissingCalldata);
    }
    let byte_len = usize::try_from(frame[3]).map_err(|_| RejectedTxn::MissingCalldata)?;
    let word_count = usize::try_from(frame[4]).map_err(|_| RejectedTxn::MissingCalldata)?;
    let words = &frame[5..];
    if words.len() != word_count {
        return Err(RejectedTxn::FrameMismatch {
            declared: word_count,
            got: words.len(),
        });
    }
    let words = words
        .iter()
        .map(|word| B256::from(*word))
        .collect::<Vec<_>>();
    Ok(packing::unpack(&words, byte_len)?)
}

/// Reassembles `(r, s, v)` from the 5-felt signature.
fn split_signature(signature: &[U256]) -> Result<(U256, U256, u64), RejectedTxn> {
    let &[r_low, r_high, s_low, s_high, v] = signature else {
        return Err(RejectedTxn::SignatureArity(signature.len()));
    };
    if [r_low, r_high, s_low, s_high]
        .iter()
        .any(|half| (*half >> 128) != U256::ZERO)
    {
        return Err(RejectedTxn::WideSignatureHalf);
    }
    let v = u64::try_from(v).map_err(|_| RejectedTxn::WideRecoveryId)?;
    Ok(((r_high << 128) | r_low, (s_high << 128) | s_low, v))
}

fn recovery_signature(r: U256, s: U256, v: u64) -> Result<Signature, RejectedTxn> {
    if v > 1 {
        return Err(RejectedTxn::BadRecoveryId(v));
    }
    Ok(Signature::from_rs_and_parity(r, s, v)?)
}

/// Opens the outer RLP list and returns its body, which must span the whole
/// payload.
fn open_list<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], alloy::rlp::Error> {
    let header = RlpHeader::decode(buf)?;
    if !header.list {
        return Err(alloy::rlp::Error::UnexpectedString);
    }
    if buf.len() != header.payload_length {
        return Err(alloy::rlp::Error::ListLengthMismatch {
            expected: header.payload_length,
            got: buf.len(),
        });
    }
    Ok(*buf)
}

/// Decodes the 9-field EIP-155 signing preimage
/// `[nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]`.
///
/// The decoded `chain_id` placeholder is overwritten by the caller with the
/// signature-derived value.
fn decode_legacy(payload: &[u8]) -> Result<TxLegacy, alloy::rlp::Error> {
    let mut fields = open_list(&mut &payload[..])?;
    let tx = TxLegacy {
        chain_id: None,
        nonce: u64::decode(&mut fields)?,
        gas_price: u128::decode(&mut fields)?,
        gas_limit: u128::decode(&mut fields)?,
        to: TxKind::decode(&mut fields)?,
        value: U256::decode(&mut fields)?,
        input: Bytes::decode(&mut fields)?,
    };
    let _chain_id = u64::decode(&mut fields)?;
    for _ in 0..2 {
        if u64::decode(&mut fields)? != 0 {
            return Err(alloy::rlp::Error::Custom("eip-155 placeholder must be zero"));
        }
    }
    if !fields.is_empty() {
        return Err(alloy::rlp::Error::UnexpectedLength);
    }
    Ok(tx)
}

/// Decodes the unsigned field list of an EIP-2930 transaction.
fn decode_eip2930(payload: &[u8]) -> Result<TxEip2930, alloy::rlp::Error> {
    let mut fields = open_list(&mut &payload[..])?;
    let tx = TxEip2930 {
        chain_id: u64::decode(&mut fields)?,
        nonce: u64::decode(&mut fields)?,
        gas_price: u128::decode(&mut fields)?,
        gas_limit: u128::decode(&mut fields)?,
        to: TxKind::decode(&mut fields)?,
        value: U256::decode(&mut fields)?,
        input: Bytes::decode(&mut fields)?,
        access_list: AccessList::decode(&mut fields)?,
    };
    if !fields.is_empty() {
        return Err(alloy::rlp::Error::UnexpectedLength);
    }
    Ok(tx)
}

/// Decodes the unsigned field list of an EIP-1559 transaction.
fn decode_eip1559(payload: &[u8]) -> Result<TxEip1559, alloy::rlp::Error> {
    let mut fields = open_list(&mut &payload[..])?;
    let tx = TxEip1559 {
        chain_id: u64::decode(&mut fields)?,
        nonce: u64::decode(&mut fields)?,
        max_priority_fee_per_gas: u128::decode(&mut fields)?,
        max_fee_per_gas: u128::decode(&mut fields)?,
        gas_limit: u128::decode(&mut fields)?,
        to: TxKind::decode(&mut fields)?,
        value: U256::decode(&mut fields)?,
        input: Bytes::decode(&mut fields)?,
        access_list: AccessList::decode(&mut fields)?,
    };
    if !fields.is_empty() {
        return Err(alloy::rlp::Error::UnexpectedLength);
    }
    Ok(tx)
}

/// Per-variant field view, so the variant match lives in one place.
struct TxView<'a> {
    hash: B256,
    tx_type: u8,
    chain_id: Option<u64>,
    nonce: u64,
    gas_limit: u128,
    to: TxKind,
    value: U256,
    input: &'a Bytes,
    gas_price: Option<u128>,
    max_fee_per_gas: Option<u128>,
    max_priority_fee_per_gas: Option<u128>,
    access_list: Option<&'a AccessList>,
    signature: &'a Signature,
}

impl DecodedTxn {
    fn view(&self) -> TxView<'_> {
        match &self.envelope {
            TxEnvelope::Legacy(signed) => {
                let tx = signed.tx();
                TxView {
                    hash: *signed.hash(),
                    tx_type: 0,
                    chain_id: tx.chain_id,
                    nonce: tx.nonce,
                    gas_limit: tx.gas_limit,
                    to: tx.to,
                    value: tx.value,
                    input: &tx.input,
                    gas_price: Some(tx.gas_price),
                    max_fee_per_gas: None,
                    max_priority_fee_per_gas: None,
                    access_list: None,
                    signature: signed.signature(),
                }
            }
            TxEnvelope::Eip2930(signed) => {
                let tx = signed.tx();
                TxView {
                    hash: *signed.hash(),
                    tx_type: 1,
                    chain_id: Some(tx.chain_id),
                    nonce: tx.nonce,
                    gas_limit: tx.gas_limit,
                    to: tx.to,
                    value: tx.value,
                    input: &tx.input,
                    gas_price: Some(tx.gas_price),
                    max_fee_per_gas: None,
                    max_priority_fee_per_gas: None,
                    access_list: Some(&tx.access_list),
                    signature: signed.signature(),
                }
            }
            TxEnvelope::Eip1559(signed) => {
                let tx = signed.tx();
                TxView {
                    hash: *signed.hash(),
                    tx_type: 2,
                    chain_id: Some(tx.chain_id),
                    nonce: tx.nonce,
                    gas_limit: tx.gas_limit,
                    to: tx.to,
                    value: tx.value,
                    input: &tx.input,
                    gas_price: None,
                    max_fee_per_gas: Some(tx.max_fee_per_gas),
                    max_priority_fee_per_gas: Some(tx.max_priority_fee_per_gas),
                    access_list: Some(&tx.access_list),
                    signature: signed.signature(),
                }
            }
            _ => unreachable!("the decoder only produces legacy, eip-2930 and eip-1559 envelopes"),
        }
    }

    pub fn hash(&self) -> B256 {
        self.view().hash
    }

    pub fn nonce(&self) -> u64 {
        self.view().nonce
    }

    pub fn to(&self) -> TxKind {
        self.view().to
    }

    pub fn tx_type(&self) -> u8 {
        self.view().tx_type
    }

    /// Canonical serialization inserted into the transaction trie
    /// (type-prefixed for non-legacy).
    pub fn encoded(&self) -> Vec<u8> {
        self.envelope.encoded_2718()
    }

    /// Price actually paid per unit of gas under the block's base fee.
    pub fn effective_gas_price(&self, base_fee: u128) -> u128 {
        let view = self.view();
        match view.gas_price {
            Some(price) => price,
            None => cmp::min(
                view.max_fee_per_gas.unwrap_or(0),
                base_fee.saturating_add(view.max_priority_fee_per_gas.unwrap_or(0)),
            ),
        }
    }

    /// The JSON-RPC-shaped projection, with block linkage fields already
    /// resolved by the caller.
    pub fn to_record(
        &self,
        block_hash: Option<B256>,
        block_number: u64,
        index: Option<u64>,
    ) -> EthTransaction {
        let view = self.view();
        let (v, y_parity) = match view.signature.v() {
            Parity::Eip155(v) => (U256::from(v), None),
            Parity::NonEip155(odd) => (U256::from(27 + odd as u64), None),
            Parity::Parity(odd) => (U256::from(odd as u64), Some(odd)),
        };
        EthTransaction {
            hash: view.hash,
            nonce: view.nonce,
            block_hash,
            block_number: Some(block_number),
            transaction_index: index,
            from: self.from,
            to: view.to.to().copied(),
            value: view.value,
            gas: view.gas_limit,
            gas_price: view.gas_price,
            max_fee_per_gas: view.max_fee_per_gas,
            max_priority_fee_per_gas: view.max_priority_fee_per_gas,
            input: view.input.clone(),
            r: view.signature.r(),
            s: view.signature.s(),
            v,
            y_parity,
            chain_id: view.chain_id,
            access_list: view.access_list.cloned(),
            transaction_type: view.tx_type,
        }
    }
}
