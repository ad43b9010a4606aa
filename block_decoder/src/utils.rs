//! Felt-level helpers shared across the pipeline (and by the view-call
//! client, which derives entrypoint selectors the same way).

use alloy::primitives::{keccak256, Address, U256};

/// Low 250 bits set; chain-native selectors are truncated to this width.
const SELECTOR_MASK: U256 = U256::from_limbs([
    u64::MAX,
    u64::MAX,
    u64::MAX,
    0x03ff_ffff_ffff_ffff,
]);

/// The chain-native keccak variant: `keccak256` truncated to 250 bits.
///
/// Used both for event selectors (`keys[0]` of bookkeeping events) and for
/// the system contract's entrypoint selectors.
pub fn starknet_keccak(data: &[u8]) -> U256 {
    U256::from_be_bytes(keccak256(data).0) & SELECTOR_MASK
}

/// Interprets a felt as an EVM address (its low 20 bytes).
pub fn felt_to_address(felt: U256) -> Address {
    Address::from_slice(&felt.to_be_bytes::<32>()[12..])
}

/// Reassembles a byte string stored one byte per felt.
///
/// Only the low byte of each felt is meaningful.
pub(crate) fn felts_to_bytes(felts: &[U256]) -> Vec<u8> {
    felts.iter().map(|felt| felt.to_be_bytes::<32>()[31]).collect()
}
