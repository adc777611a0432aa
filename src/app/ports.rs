use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

use crate::pipeline::ingestion::{Batch, LoadedBatch};
use crate::pipeline::processing::WideTable;

/// Where extracted long-form batches come from
#[async_trait]
pub trait BatchSourcePort: Send + Sync {
    async fn list_batches(&self) -> Result<Vec<Batch>>;
    async fn load_batch(&self, batch: &Batch) -> Result<LoadedBatch>;
}

/// Where wide tables are written, addressed by name (file stem)
#[async_trait]
pub trait TableOutputPort: Send + Sync {
    async fn exists(&self, name: &str) -> bool;
    async fn write_table(&self, name: &str, table: &WideTable) -> Result<PathBuf>;
}

/// Previously written wide tables, read back for the combine stage
#[async_trait]
pub trait TableInputPort: Send + Sync {
    async fn read_tables(&self) -> Result<Vec<(String, WideTable)>>;
}
