use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::constants::CATEGORY_SEPARATOR;
use crate::error::{PipelineError, Result, RowError};
use crate::types::{CountType, ObservationRow};

use super::years::{resolve_year, RawYear};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Ndjson,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(FileFormat::Csv),
            "ndjson" | "jsonl" => Some(FileFormat::Ndjson),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Ndjson => "ndjson",
        }
    }
}

/// A record that could not be turned into an [`ObservationRow`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadRejection {
    pub path: String,
    /// 1-based line (NDJSON) or record number (CSV)
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedBatch {
    pub rows: Vec<ObservationRow>,
    pub rejections: Vec<LoadRejection>,
}

impl LoadedBatch {
    pub fn extend(&mut self, other: LoadedBatch) {
        self.rows.extend(other.rows);
        self.rejections.extend(other.rejections);
    }
}

#[derive(Debug, Deserialize)]
struct CsvRecord {
    year: String,
    source: String,
    source_institution_id: String,
    #[serde(default)]
    source_institution_name: Option<String>,
    source_category_type: String,
    source_category_value: String,
    #[serde(default)]
    count_type: Option<String>,
    count: String,
}

impl CsvRecord {
    fn into_row(self) -> std::result::Result<ObservationRow, String> {
        let year = resolve_year(&self.year).map_err(|e| e.to_string())?;
        let count = self.count.trim();
        if count.is_empty() {
            return Err(RowError::MissingField("count").to_string());
        }
        let count: f64 = count
            .parse()
            .map_err(|_| RowError::Unparseable(format!("count '{}'", count)).to_string())?;

        Ok(ObservationRow {
            institution_id: self.source_institution_id.trim().to_string(),
            institution_name: self.source_institution_name.unwrap_or_default().trim().to_string(),
            source: self.source.trim().to_string(),
            year,
            category_type: split_categories(&self.source_category_type),
            category_value: split_categories(&self.source_category_value),
            count_type: parse_count_type(self.count_type.as_deref())?,
            count,
            global_id: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct NdjsonRecord {
    year: RawYear,
    source: String,
    #[serde(alias = "source_institution_id")]
    institution_id: String,
    #[serde(default, alias = "source_institution_name")]
    institution_name: Option<String>,
    #[serde(alias = "source_category_type")]
    category_type: Vec<String>,
    #[serde(alias = "source_category_value")]
    category_value: Vec<String>,
    #[serde(default)]
    count_type: Option<String>,
    count: f64,
}

impl NdjsonRecord {
    fn into_row(self) -> std::result::Result<ObservationRow, String> {
        Ok(ObservationRow {
            institution_id: self.institution_id,
            institution_name: self.institution_name.unwrap_or_default(),
            source: self.source,
            year: self.year.resolve().map_err(|e| e.to_string())?,
            category_type: self.category_type,
            category_value: self.category_value,
            count_type: parse_count_type(self.count_type.as_deref())?,
            count: self.count,
            global_id: None,
        })
    }
}

fn split_categories(cell: &str) -> Vec<String> {
    if cell.trim().is_empty() {
        return Vec::new();
    }
    cell.split(CATEGORY_SEPARATOR).map(|s| s.trim().to_string()).collect()
}

fn parse_count_type(raw: Option<&str>) -> std::result::Result<Option<CountType>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(label) => CountType::parse(label)
            .map(Some)
            .ok_or_else(|| RowError::Unparseable(format!("count type '{}'", label)).to_string()),
    }
}

/// Load a long-form CSV file. Bad records are rejected, I/O failures propagate.
pub fn load_csv(path: &Path) -> Result<LoadedBatch> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_path(path)?;
    let shown = path.display().to_string();
    let mut batch = LoadedBatch::default();

    for (index, record) in reader.deserialize::<CsvRecord>().enumerate() {
        let line = index as u64 + 1;
        let parsed = match record {
            Ok(record) => record.into_row(),
            Err(e) if e.is_io_error() => return Err(PipelineError::Csv(e)),
            Err(e) => Err(RowError::Unparseable(e.to_string()).to_string()),
        };
        match parsed {
            Ok(row) => batch.rows.push(row),
            Err(reason) => batch.rejections.push(LoadRejection {
                path: shown.clone(),
                line,
                reason,
            }),
        }
    }

    debug!(path = %shown, rows = batch.rows.len(), rejected = batch.rejections.len(), "Loaded CSV file");
    Ok(batch)
}

/// Load a newline-delimited JSON file. Blank lines are skipped.
pub fn load_ndjson(path: &Path) -> Result<LoadedBatch> {
    let reader = BufReader::new(File::open(path)?);
    let shown = path.display().to_string();
    let mut batch = LoadedBatch::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = serde_json::from_str::<NdjsonRecord>(&line)
            .map_err(|e| RowError::Unparseable(e.to_string()).to_string())
            .and_then(NdjsonRecord::into_row);
        match parsed {
            Ok(row) => batch.rows.push(row),
            Err(reason) => batch.rejections.push(LoadRejection {
                path: shown.clone(),
                line: index as u64 + 1,
                reason,
            }),
        }
    }

    debug!(path = %shown, rows = batch.rows.len(), rejected = batch.rejections.len(), "Loaded NDJSON file");
    Ok(batch)
}

pub fn load_file(path: &Path, format: FileFormat) -> Result<LoadedBatch> {
    match format {
        FileFormat::Csv => load_csv(path),
        FileFormat::Ndjson => load_ndjson(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_csv_splits_categories_and_rejects_bad_records() {
        let file = write_temp(
            ".csv",
            "year,source,source_institution_id,source_institution_name,source_category_type,source_category_value,count_type,count\n\
             2015/16,uk_hesa,10007783,The University of Aberdeen,sex|contract_marker,Female|Academic,fte,10\n\
             2016,uk_hesa,10007783,The University of Aberdeen,sex|contract_marker,Male|Academic,,15.5\n\
             someday,uk_hesa,10007783,The University of Aberdeen,sex,Male,,1\n\
             2016,uk_hesa,10007783,The University of Aberdeen,sex,Male,,\n",
        );

        let batch = load_csv(file.path()).unwrap();

        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.rejections.len(), 2);
        let first = &batch.rows[0];
        assert_eq!(first.year, 2016);
        assert_eq!(first.category_type, vec!["sex", "contract_marker"]);
        assert_eq!(first.category_value, vec!["Female", "Academic"]);
        assert_eq!(first.count_type, Some(CountType::Fte));
        assert_eq!(batch.rows[1].count_type, None);
        assert_eq!(batch.rows[1].count, 15.5);
        assert_eq!(batch.rejections[0].line, 3);
    }

    #[test]
    fn test_load_ndjson_accepts_both_field_spellings() {
        let file = write_temp(
            ".ndjson",
            "{\"year\": \"2015\", \"source\": \"nz_moe\", \"source_institution_id\": \"massey\", \"source_category_type\": [\"gender\"], \"source_category_value\": [\"total\"], \"count_type\": \"number of staff\", \"count\": 100}\n\
             \n\
             {\"year\": 2016, \"source\": \"nz_moe\", \"institution_id\": \"massey\", \"institution_name\": \"Massey University\", \"category_type\": [], \"category_value\": [], \"count\": 3}\n\
             not json\n",
        );

        let batch = load_ndjson(file.path()).unwrap();

        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.rows[0].count_type, Some(CountType::Headcount));
        assert_eq!(batch.rows[1].institution_name, "Massey University");
        assert_eq!(batch.rejections.len(), 1);
        assert_eq!(batch.rejections[0].line, 4);
    }

    #[test]
    fn test_unknown_count_type_label_is_rejected() {
        let file = write_temp(
            ".jsonl",
            "{\"year\": 2016, \"source\": \"nz_moe\", \"institution_id\": \"a\", \"category_type\": [], \"category_value\": [], \"count_type\": \"bushels\", \"count\": 1}\n",
        );
        let batch = load_file(file.path(), FileFormat::Ndjson).unwrap();
        assert!(batch.rows.is_empty());
        assert!(batch.rejections[0].reason.contains("bushels"));
    }

    #[test]
    fn test_rejections_record_the_file_path() {
        let csv = write_temp(".csv", "year,source,count\nlater,uk_hesa,1\n");
        let batch = load_csv(csv.path()).unwrap();
        assert_eq!(batch.rejections[0].path, csv.path().display().to_string());

        let ndjson = write_temp(".ndjson", "{}\n");
        let batch = load_ndjson(ndjson.path()).unwrap();
        assert_eq!(batch.rejections[0].path, ndjson.path().display().to_string());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_extension("JSONL"), Some(FileFormat::Ndjson));
        assert_eq!(FileFormat::from_extension("hd5"), None);
    }
}
