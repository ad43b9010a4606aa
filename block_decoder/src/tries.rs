//! Principled wrappers over the block's two Merkle-Patricia tries.
//!
//! Both tries are keyed by `RLP(transaction index)`. The transaction trie
//! holds canonical typed-transaction serializations; the receipt trie holds
//! type-prefixed receipt encodings. Roots are a function of the key/value
//! set alone, so insertion order never matters - but every qualifying and
//! every reverted transaction must be inserted before a root is read.

use std::fmt;
use std::sync::Arc;

use alloy::primitives::B256;
use eth_trie::{EthTrie, MemoryDB, Trie as _};
use thiserror::Error;

/// An invariant violation inside the backing trie store; fatal to the block.
#[derive(Debug, Error)]
#[error("trie operation failed: {0:?}")]
pub struct TrieOpError(eth_trie::TrieError);

impl From<eth_trie::TrieError> for TrieOpError {
    fn from(err: eth_trie::TrieError) -> Self {
        Self(err)
    }
}

/// One transaction's contribution to both tries, consumed exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrieInput {
    /// Position of the transaction within the block.
    pub index: usize,
    /// Canonical typed-transaction serialization.
    pub transaction: Vec<u8>,
    /// Type-prefixed receipt encoding.
    pub receipt: Vec<u8>,
}

/// Per-block, `RLP(txn index) -> serialized transaction`.
pub struct TransactionTrie {
    untyped: EthTrie<MemoryDB>,
}

impl fmt::Debug for TransactionTrie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionTrie").finish_non_exhaustive()
    }
}

impl TransactionTrie {
    /// An empty trie; its root is the canonical empty root.
    pub fn new() -> Self {
        Self {
            untyped: EthTrie::new(Arc::new(MemoryDB::new(true))),
        }
    }

    /// Inserts one transaction's serialization at its index.
    pub fn insert(&mut self, txn_ix: usize, val: &[u8]) -> Result<(), TrieOpError> {
        self.untyped.insert(&rlp::encode(&txn_ix), val)?;
        Ok(())
    }

    /// Root over everything inserted so far.
    pub fn root(&mut self) -> Result<B256, TrieOpError> {
        Ok(compat::h256(self.untyped.root_hash()?))
    }
}

impl Default for TransactionTrie {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-block, `RLP(txn index) -> encoded receipt`.
pub struct ReceiptTrie {
    untyped: EthTrie<MemoryDB>,
}

impl fmt::Debug for ReceiptTrie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiptTrie").finish_non_exhaustive()
    }
}

impl ReceiptTrie {
    /// An empty trie; its root is the canonical empty root.
    pub fn new() -> Self {
        Self {
            untyped: EthTrie::new(Arc::new(MemoryDB::new(true))),
        }
    }

    /// Inserts one receipt's encoding at its transaction's index.
    pub fn insert(&mut self, txn_ix: usize, val: &[u8]) -> Result<(), TrieOpError> {
        self.untyped.insert(&rlp::encode(&txn_ix), val)?;
        Ok(())
    }

    /// Root over everything inserted so far.
    pub fn root(&mut self) -> Result<B256, TrieOpError> {
        Ok(compat::h256(self.untyped.root_hash()?))
    }
}

impl Default for ReceiptTrie {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds both tries from the block's complete trie inputs and reads their
/// roots: `(transactions_root, receipts_root)`.
pub fn roots(inputs: &[TrieInput]) -> Result<(B256, B256), TrieOpError> {
    let mut transactions = TransactionTrie::new();
    let mut receipts = ReceiptTrie::new();
    for input in inputs {
        transactions.insert(input.index, &input.transaction)?;
        receipts.insert(input.index, &input.receipt)?;
    }
    Ok((transactions.root()?, receipts.root()?))
}

mod compat {
    //! `eth_trie` speaks `ethereum-types` hashes.

    use alloy::primitives::B256;

    pub fn h256(ethereum_types::H256(bytes): ethereum_types::H256) -> B256 {
        B256::new(bytes)
    }
}
