//! Cumulative gas bookkeeping across one block.

use std::collections::BTreeMap;

/// Cumulative gas per transaction index, appended in event-path processing
/// order.
///
/// The ledger is sparse: a transaction that reverted before emitting a
/// completion event has no entry, and its pre-revert cumulative gas is the
/// value recorded at the largest index at or below its own.
#[derive(Debug, Default)]
pub(crate) struct GasLedger {
    cumulative: BTreeMap<u64, u128>,
}

impl GasLedger {
    /// Records the cumulative gas consumed up to and including `index`.
    pub fn record(&mut self, index: u64, cumulative: u128) {
        self.cumulative.insert(index, cumulative);
    }

    /// Cumulative gas at the largest recorded index `<= index`; zero when no
    /// such entry exists.
    pub fn resolve(&self, index: u64) -> u128 {
        self.cumulative
            .range(..=index)
            .next_back()
            .map(|(_, gas)| *gas)
            .unwrap_or(0)
    }

    /// Cumulative gas of the whole block.
    pub fn total(&self) -> u128 {
        self.cumulative.values().next_back().copied().unwrap_or(0)
    }
}
