use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::id_map_prefix;
use crate::error::Result;
use crate::types::ObservationRow;

const UNMAPPED_SAMPLE: usize = 10;

/// Source-local institution id to global id.
///
/// Lookups try the id verbatim first, then a folded form (lowercased, trimmed,
/// commas and a leading "the " removed) for maps keyed by institution name.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    exact: HashMap<String, String>,
    folded: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MappingReport {
    pub mapped_rows: usize,
    pub unmapped_rows: usize,
    pub unmapped_sample: Vec<String>,
}

pub fn fold_key(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase().replace(',', "");
    match lowered.strip_prefix("the ") {
        Some(rest) => rest.trim_start().to_string(),
        None => lowered,
    }
}

impl IdMap {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::default();
        for (k, v) in pairs {
            map.insert(k.into(), v.into());
        }
        map
    }

    fn insert(&mut self, local: String, global: String) {
        self.folded.entry(fold_key(&local)).or_insert_with(|| global.clone());
        self.exact.insert(local, global);
    }

    /// Parse a flat JSON object. Null values mean "known but unmapped".
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, Option<String>> = serde_json::from_str(json)?;
        Ok(Self::from_pairs(
            raw.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))),
        ))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load `<prefix>_id_map.json` for a source, or `None` if the file does not exist
    pub fn load_for_source(dir: &Path, source: &str) -> Result<Option<Self>> {
        let path = Self::path_for_source(dir, source);
        if !path.exists() {
            warn!(source = %source, path = %path.display(), "No identifier map for source");
            return Ok(None);
        }
        let map = Self::load(&path)?;
        info!(source = %source, entries = map.len(), "Loaded identifier map");
        Ok(Some(map))
    }

    pub fn path_for_source(dir: &Path, source: &str) -> PathBuf {
        dir.join(format!("{}_id_map.json", id_map_prefix(source)))
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    pub fn lookup(&self, local: &str) -> Option<&str> {
        self.exact
            .get(local)
            .or_else(|| self.folded.get(&fold_key(local)))
            .map(String::as_str)
    }

    /// Set `global_id` on every row. Unmapped rows keep `None`.
    pub fn apply(&self, rows: &mut [ObservationRow]) -> MappingReport {
        let mut report = MappingReport::default();
        let mut unmapped = BTreeSet::new();
        for row in rows.iter_mut() {
            row.global_id = self.lookup(&row.institution_id).map(str::to_string);
            if row.global_id.is_some() {
                report.mapped_rows += 1;
            } else {
                report.unmapped_rows += 1;
                unmapped.insert(row.institution_id.clone());
            }
        }
        report.unmapped_sample = unmapped.into_iter().take(UNMAPPED_SAMPLE).collect();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str) -> ObservationRow {
        ObservationRow {
            institution_id: id.to_string(),
            institution_name: String::new(),
            source: "au_det".to_string(),
            year: 2016,
            category_type: vec![],
            category_value: vec![],
            count_type: None,
            count: 1.0,
            global_id: None,
        }
    }

    #[test]
    fn test_exact_then_folded_lookup() {
        let map = IdMap::from_pairs([("university of sydney", "grid.1013.3"), ("10007783", "grid.7107.1")]);
        assert_eq!(map.lookup("10007783"), Some("grid.7107.1"));
        assert_eq!(map.lookup("The University of Sydney "), Some("grid.1013.3"));
        assert_eq!(map.lookup("University of Melbourne"), None);
    }

    #[test]
    fn test_folded_lookup_ignores_commas() {
        let map = IdMap::from_pairs([("university of new south wales", "grid.1005.4")]);
        assert_eq!(map.lookup("The University of New South Wales,"), Some("grid.1005.4"));
        assert_eq!(fold_key("Charles Sturt University, Wagga"), "charles sturt university wagga");
    }

    #[test]
    fn test_null_entries_are_unmapped() {
        let map = IdMap::from_json(r#"{"a": "grid.1", "b": null}"#).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.lookup("b"), None);
    }

    #[test]
    fn test_apply_reports_unmapped() {
        let map = IdMap::from_pairs([("a", "grid.1")]);
        let mut rows = vec![row("a"), row("b"), row("b"), row("c")];
        let report = map.apply(&mut rows);
        assert_eq!(report.mapped_rows, 1);
        assert_eq!(report.unmapped_rows, 3);
        assert_eq!(report.unmapped_sample, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(rows[0].global_id.as_deref(), Some("grid.1"));
        assert!(rows[1].global_id.is_none());
    }

    #[test]
    fn test_load_for_source_uses_country_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("uk_id_map.json"), r#"{"10007783": "grid.7107.1"}"#).unwrap();
        let map = IdMap::load_for_source(dir.path(), "uk_hesa").unwrap().unwrap();
        assert_eq!(map.lookup("10007783"), Some("grid.7107.1"));
        assert!(IdMap::load_for_source(dir.path(), "nz_moe").unwrap().is_none());
    }
}
