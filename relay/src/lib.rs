//! Everything externally-facing around [`block_decoder`]: the system
//! contract view-call client with its per-call fallbacks, the record sinks,
//! the stdin block feed, and process plumbing (env, tracing).

pub mod env;
pub mod feed;
pub mod oracle;
pub mod sink;
pub mod tracing;
