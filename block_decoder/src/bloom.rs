//! Bloom filter aggregation over log addresses and topics.

use alloy::primitives::{Bloom, BloomInput};

use crate::event::LogContent;

/// Accrues one log's address and every topic into `bloom`.
pub(crate) fn accrue_log(bloom: &mut Bloom, log: &LogContent) {
    bloom.accrue(BloomInput::Raw(log.address.as_slice()));
    for topic in &log.topics {
        bloom.accrue(BloomInput::Raw(topic.as_slice()));
    }
}

/// Bloom over a receipt's logs. Bitwise OR is commutative, so the result is
/// independent of log order.
pub(crate) fn logs_bloom<'a>(logs: impl IntoIterator<Item = &'a LogContent>) -> Bloom {
    let mut bloom = Bloom::ZERO;
    for log in logs {
        accrue_log(&mut bloom, log);
    }
    bloom
}
