use tracing_subscriber::{prelude::*, util::SubscriberInitExt, EnvFilter};

/// Installs the process-wide subscriber; `RUST_LOG` overrides the default
/// `info` filter. The fmt layer also picks up `log` records emitted by
/// `block_decoder`.
pub fn init() {
    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer().with_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            ),
        )
        .init();
}
