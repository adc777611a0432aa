use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::app::ports::{TableInputPort, TableOutputPort};
use crate::pipeline::ingestion::FileFormat;
use crate::pipeline::processing::WideTable;

use super::table_csv::{read_wide_csv, write_wide_csv};
use super::table_ndjson::{read_wide_ndjson, write_wide_ndjson};

/// Wide tables stored as `<dir>/<name>.<ext>` in a single format
#[derive(Debug, Clone)]
pub struct FileTableStore {
    dir: PathBuf,
    format: FileFormat,
}

impl FileTableStore {
    pub fn new(dir: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    /// Store for a single file path such as `data/combined.csv`; returns the store and the table name
    pub fn for_file(path: &Path) -> Result<(Self, String)> {
        let format = FileFormat::from_path(path)
            .with_context(|| format!("Unsupported output extension: {}", path.display()))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("Invalid output file name: {}", path.display()))?
            .to_string();
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Ok((Self::new(dir, format), name))
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, self.format.extension()))
    }
}

#[async_trait]
impl TableOutputPort for FileTableStore {
    async fn exists(&self, name: &str) -> bool {
        self.path_for(name).exists()
    }

    async fn write_table(&self, name: &str, table: &WideTable) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.path_for(name);
        match self.format {
            FileFormat::Csv => write_wide_csv(&path, table)?,
            FileFormat::Ndjson => write_wide_ndjson(&path, table)?,
        }
        info!(path = %path.display(), rows = table.len(), columns = table.columns().len(), "Wrote table");
        Ok(path)
    }
}

#[async_trait]
impl TableInputPort for FileTableStore {
    /// Every table file of this store's format, sorted by name
    async fn read_tables(&self) -> Result<Vec<(String, WideTable)>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && FileFormat::from_path(&path) == Some(self.format) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut tables = Vec::with_capacity(paths.len());
        for path in paths {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let table = match self.format {
                FileFormat::Csv => read_wide_csv(&path),
                FileFormat::Ndjson => read_wide_ndjson(&path),
            }
            .with_context(|| format!("Failed to read table {}", path.display()))?;
            debug!(table = %name, rows = table.len(), "Read table");
            tables.push((name, table));
        }
        Ok(tables)
    }
}
