//! Record sinks: where a block's `StoreItem`s go once the transform is done.
//!
//! A block commits all-or-nothing; the pipeline never hands a sink a partial
//! block.

use std::future::Future;
use std::path::PathBuf;

use anyhow::Context as _;
use block_decoder::records::StoreItem;
use tokio::io::AsyncWriteExt as _;

/// Durable destination for one block's ordered records.
pub trait StoreSink {
    /// Persists the complete record set of block `block_number`.
    fn commit(
        &mut self,
        block_number: u64,
        items: &[StoreItem],
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Writes each block to `<output_dir>/b<height>.json`.
#[derive(Debug)]
pub struct JsonDirSink {
    output_dir: PathBuf,
}

impl JsonDirSink {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

impl StoreSink for JsonDirSink {
    async fn commit(&mut self, block_number: u64, items: &[StoreItem]) -> anyhow::Result<()> {
        if !self.output_dir.exists() {
            tokio::fs::create_dir_all(&self.output_dir).await?;
        }
        let path = self.output_dir.join(format!("b{block_number}.json"));
        let payload = serde_json::to_vec(items)?;

        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(&payload)
            .await
            .with_context(|| format!("failed to write records to {}", path.display()))?;

        tracing::info!(
            "wrote {} records for block {block_number} to {}",
            items.len(),
            path.display()
        );
        Ok(())
    }
}

/// Prints each record as one JSON line; the default when no output directory
/// is configured.
#[derive(Debug)]
pub struct StdoutSink;

impl StoreSink for StdoutSink {
    async fn commit(&mut self, _block_number: u64, items: &[StoreItem]) -> anyhow::Result<()> {
        for item in items {
            println!("{}", serde_json::to_string(item)?);
        }
        Ok(())
    }
}
