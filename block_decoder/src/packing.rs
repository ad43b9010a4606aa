//! The chain stores byte strings as arrays of field elements, and a field
//! element holds slightly less than 32 bytes.
//!
//! Byte strings are therefore packed 31 bytes at a time (31 bytes always fit
//! under the ~252-bit field modulus), each chunk left-padded to a 32-byte
//! word. Unpacking is *not* "concatenate and trim": the caller must supply
//! the exact original byte length, because a packed word does not remember
//! how many of its low bytes are meaningful.

use alloy::primitives::B256;
use thiserror::Error;

/// Number of source bytes carried by every packed word except possibly the
/// last.
pub const BYTES_PER_WORD: usize = 31;

/// Errors from [`unpack`] when the declared byte length cannot be produced
/// from the given words.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum UnpackError {
    /// The declared length needs more bytes than the words can carry.
    #[error("declared length {byte_len} exceeds the {words} packed words")]
    TooLong {
        /// Declared unpacked length.
        byte_len: usize,
        /// Number of packed words supplied.
        words: usize,
    },
    /// The declared length leaves at least one trailing word unused.
    #[error("declared length {byte_len} leaves trailing packed words unused")]
    TooShort {
        /// Declared unpacked length.
        byte_len: usize,
    },
}

/// Packs `bytes` into 32-byte words of at most [`BYTES_PER_WORD`] source
/// bytes each.
pub fn pack(bytes: &[u8]) -> Vec<B256> {
    bytes
        .chunks(BYTES_PER_WORD)
        .map(|chunk| {
            let mut word = [0; 32];
            word[32 - chunk.len()..].copy_from_slice(chunk);
            B256::new(word)
        })
        .collect()
}

/// Recovers the original byte string of length `byte_len` from its packed
/// words.
///
/// Every word except the last contributes its low [`BYTES_PER_WORD`] bytes
/// verbatim; the last word contributes exactly the bytes still needed to
/// reach `byte_len`, measured from its low end.
///
/// Law: `unpack(&pack(b), b.len()) == b` for any byte string `b`.
pub fn unpack(words: &[B256], byte_len: usize) -> Result<Vec<u8>, UnpackError> {
    let Some((last, full)) = words.split_last() else {
        return match byte_len {
            0 => Ok(Vec::new()),
            _ => Err(UnpackError::TooLong {
                byte_len,
                words: 0,
            }),
        };
    };

    let tail = byte_len
        .checked_sub(full.len() * BYTES_PER_WORD)
        .ok_or(UnpackError::TooShort { byte_len })?;
    if tail == 0 {
        return Err(UnpackError::TooShort { byte_len });
    }
    if tail > BYTES_PER_WORD {
        return Err(UnpackError::TooLong {
            byte_len,
            words: words.len(),
        });
    }

    let mut bytes = Vec::with_capacity(byte_len);
    for word in full {
        bytes.extend_from_slice(&word[32 - BYTES_PER_WORD..]);
    }
    bytes.extend_from_slice(&last[32 - tail..]);
    Ok(bytes)
}
