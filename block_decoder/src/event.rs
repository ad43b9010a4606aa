//! Classifies raw chain events.
//!
//! Event shape is only ever inspected here: downstream code sees either a
//! fully-formed [`LogContent`] or a [`RejectReason`], never a raw key array.

use alloy::primitives::{Address, Bytes, B256, U256};
use itertools::Itertools as _;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::txn::RejectedTxn;
use crate::utils::{felt_to_address, felts_to_bytes, starknet_keccak};
use crate::ChainEvent;

/// Marker carried by a completion event's response when the wrapped payload
/// failed address-domain validation.
pub(crate) const VALIDATION_FAILED_MARKER: &str = "eth validation failed";

/// Bookkeeping events of the system contract that must never surface as
/// Ethereum logs.
static IGNORED_SELECTORS: Lazy<[U256; 5]> = Lazy::new(|| {
    [
        starknet_keccak(b"transaction_executed"),
        starknet_keccak(b"evm_contract_deployed"),
        starknet_keccak(b"Transfer"),
        starknet_keccak(b"Approval"),
        starknet_keccak(b"OwnershipTransferred"),
    ]
});

/// Outcome of shape-validating one chain event.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ParsedEvent {
    /// The event is an Ethereum log.
    Log(LogContent),
    /// The event is not a log; the reason says why.
    Rejected(RejectReason),
}

/// The Ethereum substance of a qualifying event.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LogContent {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Why an event did not qualify as a log.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub(crate) enum RejectReason {
    #[error("not emitted by the system contract")]
    ForeignContract,
    #[error("event has no keys")]
    NoKeys,
    #[error("even key count cannot carry an address plus topic pairs")]
    EvenKeyCount,
    #[error("internal bookkeeping event")]
    Ignored,
}

/// The single event-shape gate (see module docs).
///
/// A qualifying event carries the log address in `keys[0]` and one topic per
/// subsequent key *pair*: each 256-bit topic is split over two <=128-bit
/// felts, low half first.
pub(crate) fn parse_event(event: &ChainEvent, system_address: U256) -> ParsedEvent {
    if event.from_address != system_address {
        return ParsedEvent::Rejected(RejectReason::ForeignContract);
    }
    let Some((&address, topic_halves)) = event.keys.split_first() else {
        return ParsedEvent::Rejected(RejectReason::NoKeys);
    };
    if topic_halves.len() % 2 != 0 {
        return ParsedEvent::Rejected(RejectReason::EvenKeyCount);
    }
    if IGNORED_SELECTORS.contains(&address) {
        return ParsedEvent::Rejected(RejectReason::Ignored);
    }

    let topics = topic_halves
        .iter()
        .tuples()
        .map(|(low, high)| B256::from((*high << 128) | *low))
        .collect();

    ParsedEvent::Log(LogContent {
        address: felt_to_address(address),
        topics,
        data: felts_to_bytes(&event.data).into(),
    })
}

/// Decoded `transaction_executed` completion event.
///
/// The event's data array ends with the success flag followed by the gas
/// consumed; everything before that tail is the execution response span,
/// serialized with a leading length felt.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CompletionEvent {
    pub response: Vec<u8>,
    pub success: bool,
    pub gas_used: u128,
}

impl CompletionEvent {
    pub fn parse(event: &ChainEvent) -> Result<Self, RejectedTxn> {
        let data = &event.data;
        let Some(tail) = data.len().checked_sub(2) else {
            return Err(RejectedTxn::MalformedCompletion(
                "fewer than two data elements",
            ));
        };
        let success = data[tail] == U256::from(1);
        let gas_used = u128::try_from(data[tail + 1])
            .map_err(|_| RejectedTxn::MalformedCompletion("gas does not fit in 128 bits"))?;

        let mut response = &data[..tail];
        if let Some((&len, rest)) = response.split_first() {
            if len == U256::from(rest.len()) {
                response = rest;
            }
        }

        Ok(Self {
            response: felts_to_bytes(response),
            success,
            gas_used,
        })
    }

    /// True when the wrapped payload never executed because it failed
    /// address-domain validation; the whole transaction is then dropped.
    pub fn is_validation_failure(&self) -> bool {
        String::from_utf8_lossy(&self.response).contains(VALIDATION_FAILED_MARKER)
    }
}
