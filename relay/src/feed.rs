//! The stdin block feed: one `RawBlockInput` JSON object per line, delivered
//! atomically and in block-number order by whatever produces the stream.

use std::io::BufRead;

use anyhow::Context as _;
use block_decoder::RawBlockInput;

/// Reads newline-delimited block inputs from `reader`; blank lines are
/// skipped, malformed lines surface the JSON path that failed.
pub fn read_blocks(
    reader: impl BufRead,
) -> impl Iterator<Item = anyhow::Result<RawBlockInput>> {
    reader.lines().filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => {
            let de = &mut serde_json::Deserializer::from_str(&line);
            Some(serde_path_to_error::deserialize(de).context("malformed block input line"))
        }
        Err(err) => Some(Err(err).context("failed to read block input line")),
    })
}
