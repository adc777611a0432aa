use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

use crate::app::ports::BatchSourcePort;
use crate::pipeline::ingestion::{load_file, Batch, LoadedBatch, Walker};

/// Batches discovered on disk by [`Walker`]
pub struct FileBatchSource {
    root: PathBuf,
    sources: Option<BTreeSet<String>>,
}

impl FileBatchSource {
    pub fn new(root: impl Into<PathBuf>, sources: Option<BTreeSet<String>>) -> Self {
        Self {
            root: root.into(),
            sources,
        }
    }
}

#[async_trait]
impl BatchSourcePort for FileBatchSource {
    async fn list_batches(&self) -> Result<Vec<Batch>> {
        let walker = Walker::new(&self.root, self.sources.clone())?;
        walker
            .batches()
            .with_context(|| format!("Failed to scan {}", self.root.display()))
    }

    async fn load_batch(&self, batch: &Batch) -> Result<LoadedBatch> {
        let files = batch.files.clone();
        tokio::task::spawn_blocking(move || -> Result<LoadedBatch> {
            let mut loaded = LoadedBatch::default();
            for file in &files {
                debug!(path = %file.path.display(), "Loading file");
                let part = load_file(&file.path, file.format)
                    .with_context(|| format!("Failed to load {}", file.path.display()))?;
                loaded.extend(part);
            }
            Ok(loaded)
        })
        .await
        .context("Loader task did not complete")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lists_and_loads_configured_sources() {
        let dir = tempfile::tempdir().unwrap();
        let header = "year,source,source_institution_id,source_institution_name,source_category_type,source_category_value,count_type,count\n";
        std::fs::write(
            dir.path().join("uk_hesa_2016.csv"),
            format!("{}2016,uk_hesa,I1,Institution One,sex,Female,,10\n", header),
        )
        .unwrap();
        std::fs::write(dir.path().join("nz_moe_2016.csv"), header).unwrap();

        let source = FileBatchSource::new(dir.path(), Some(BTreeSet::from(["uk_hesa".to_string()])));
        let batches = source.list_batches().await.unwrap();
        assert_eq!(batches.len(), 1);

        let loaded = source.load_batch(&batches[0]).await.unwrap();
        assert_eq!(loaded.rows.len(), 1);
        assert_eq!(loaded.rows[0].count, 10.0);
    }
}
