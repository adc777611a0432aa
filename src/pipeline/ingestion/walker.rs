use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::Result;

use super::loader::FileFormat;

/// `<source>_<year>[_<table>].<ext>` or `<source>__all_.<ext>`
const DATA_FILE_PATTERN: &str =
    r"^(?P<source>[a-z]{2}_[a-z]+)_(?:(?P<year>\d{4})(?:_(?P<table>[A-Za-z0-9_]+))?|_all_)\.(?P<ext>csv|ndjson|jsonl)$";

/// An extracted long-form file recognised by name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DataFile {
    pub path: PathBuf,
    pub source: String,
    /// `None` for `__all_` files that span every year
    pub year: Option<i32>,
    pub table: Option<String>,
    pub format: FileFormat,
}

/// Files sharing a source and year form one batch
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchKey {
    pub source: String,
    pub year: Option<i32>,
}

impl BatchKey {
    /// Stem used for this batch's output files
    pub fn file_stem(&self) -> String {
        match self.year {
            Some(year) => format!("{}_{}", self.source, year),
            None => format!("{}__all_", self.source),
        }
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_stem())
    }
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub key: BatchKey,
    pub files: Vec<DataFile>,
}

pub struct Walker {
    root: PathBuf,
    sources: Option<BTreeSet<String>>,
    pattern: Regex,
}

impl Walker {
    /// `sources == None` accepts every source the file pattern recognises
    pub fn new(root: impl Into<PathBuf>, sources: Option<BTreeSet<String>>) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            sources,
            pattern: Regex::new(DATA_FILE_PATTERN)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Recognise a single file name
    pub fn classify(&self, path: &Path) -> Option<DataFile> {
        let name = path.file_name()?.to_str()?;
        let caps = self.pattern.captures(name)?;
        let source = caps.name("source")?.as_str().to_string();
        if let Some(sources) = &self.sources {
            if !sources.contains(&source) {
                return None;
            }
        }
        let year = match caps.name("year") {
            Some(m) => Some(m.as_str().parse().ok()?),
            None => None,
        };
        Some(DataFile {
            path: path.to_path_buf(),
            source,
            year,
            table: caps.name("table").map(|m| m.as_str().to_string()),
            format: FileFormat::from_extension(caps.name("ext")?.as_str())?,
        })
    }

    /// Recursively find recognised files under the root, sorted by path.
    /// Directory links are not followed; links to files are.
    pub fn discover(&self) -> Result<Vec<DataFile>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path();
            let is_file = entry.file_type().is_file() || (entry.path_is_symlink() && path.is_file());
            if !is_file {
                continue;
            }
            if let Some(file) = self.classify(path) {
                debug!(path = %path.display(), source = %file.source, "Matched data file");
                files.push(file);
            }
        }
        files.sort();
        info!(root = %self.root.display(), files = files.len(), "Discovered data files");
        Ok(files)
    }

    pub fn batches(&self) -> Result<Vec<Batch>> {
        Ok(group_batches(self.discover()?))
    }
}

pub fn group_batches(files: Vec<DataFile>) -> Vec<Batch> {
    let mut grouped: BTreeMap<BatchKey, Vec<DataFile>> = BTreeMap::new();
    for file in files {
        let key = BatchKey {
            source: file.source.clone(),
            year: file.year,
        };
        grouped.entry(key).or_default().push(file);
    }
    grouped
        .into_iter()
        .map(|(key, files)| Batch { key, files })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walker(sources: Option<&[&str]>) -> Walker {
        Walker::new(
            "data",
            sources.map(|s| s.iter().map(|x| x.to_string()).collect()),
        )
        .unwrap()
    }

    #[test]
    fn test_classify_file_names() {
        let w = walker(None);

        let f = w.classify(Path::new("data/uk_hesa_2016.csv")).unwrap();
        assert_eq!((f.source.as_str(), f.year, f.table), ("uk_hesa", Some(2016), None));

        let f = w.classify(Path::new("us_ipeds_2010_s.ndjson")).unwrap();
        assert_eq!(f.table.as_deref(), Some("s"));
        assert_eq!(f.format, FileFormat::Ndjson);

        let f = w.classify(Path::new("au_det__all_.jsonl")).unwrap();
        assert_eq!(f.year, None);

        assert!(w.classify(Path::new("uk_hesa_2016.hd5")).is_none());
        assert!(w.classify(Path::new("notes.csv")).is_none());
    }

    #[test]
    fn test_unconfigured_sources_are_skipped() {
        let w = walker(Some(&["nz_moe"]));
        assert!(w.classify(Path::new("uk_hesa_2016.csv")).is_none());
        assert!(w.classify(Path::new("nz_moe_2016.csv")).is_some());
    }

    #[test]
    fn test_discover_and_group() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("uk");
        std::fs::create_dir_all(&nested).unwrap();
        for name in ["us_ipeds_2010_s.csv", "us_ipeds_2010_eap.csv", "readme.md"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::write(nested.join("uk_hesa_2016.csv"), "").unwrap();

        let batches = Walker::new(dir.path(), None).unwrap().batches().unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].key.file_stem(), "uk_hesa_2016");
        assert_eq!(batches[1].key.file_stem(), "us_ipeds_2010");
        assert_eq!(batches[1].files.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_symlink_loops_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("uk_hesa_2016.csv"), "").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let files = Walker::new(dir.path(), None).unwrap().discover().unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].source, "uk_hesa");
    }

    #[cfg(unix)]
    #[test]
    fn test_linked_data_files_are_found() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let target = elsewhere.path().join("extract.csv");
        std::fs::write(&target, "").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("nz_moe_2016.csv")).unwrap();

        let files = Walker::new(dir.path(), None).unwrap().discover().unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].year, Some(2016));
    }
}
