use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::constants::{COL_INSTITUTION_ID, COL_INSTITUTION_NAME, COL_SOURCE, COL_YEAR};
use crate::error::{Result, RowError};
use crate::pipeline::ingestion::years::RawYear;
use crate::pipeline::processing::{WideRow, WideTable};

/// Write one JSON object per row. Null cells are written as `null`.
pub fn write_wide_ndjson(path: &Path, table: &WideTable) -> Result<()> {
    let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    let mut writer = BufWriter::new(file);

    for row in table.rows() {
        let mut object = Map::new();
        object.insert(COL_INSTITUTION_ID.to_string(), Value::from(row.institution_id.clone()));
        object.insert(COL_INSTITUTION_NAME.to_string(), Value::from(row.institution_name.clone()));
        object.insert(COL_SOURCE.to_string(), Value::from(row.source.clone()));
        object.insert(COL_YEAR.to_string(), Value::from(row.year));
        for column in table.columns() {
            let value = row.value(column).map_or(Value::Null, Value::from);
            object.insert(column.clone(), value);
        }
        serde_json::to_writer(&mut writer, &Value::Object(object))?;
        writer.write_all(b"\n")?;
    }

    writer.flush()?;
    Ok(())
}

pub fn read_wide_ndjson(path: &Path) -> Result<WideTable> {
    let reader = BufReader::new(File::open(path)?);
    let mut table = WideTable::default();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut object: Map<String, Value> = serde_json::from_str(&line)?;
        let mut take_str = |key: &'static str| -> Result<String> {
            match object.remove(key) {
                Some(Value::String(s)) => Ok(s),
                _ => Err(RowError::MissingField(key).into()),
            }
        };
        let institution_id = take_str(COL_INSTITUTION_ID)?;
        let institution_name = take_str(COL_INSTITUTION_NAME)?;
        let source = take_str(COL_SOURCE)?;
        let year: RawYear = serde_json::from_value(
            object
                .remove(COL_YEAR)
                .ok_or(RowError::MissingField(COL_YEAR))?,
        )?;

        let mut row = WideRow::new(&institution_id, year.resolve()?, &source, &institution_name);
        for (column, value) in object {
            table.add_column(&column);
            match value {
                Value::Null => {}
                Value::Number(n) => {
                    if let Some(v) = n.as_f64() {
                        row.values.insert(column, v);
                    }
                }
                other => {
                    return Err(RowError::Unparseable(format!("{} = {}", column, other)).into());
                }
            }
        }
        table.upsert_row(row);
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ndjson_writes_null_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nz_moe_2016.ndjson");
        let mut table = WideTable::new(vec!["academic_total_count".to_string(), "academic_white_count".to_string()]);
        let mut row = WideRow::new("massey", 2016, "nz_moe", "Massey University");
        row.values.insert("academic_total_count".to_string(), 100.0);
        table.upsert_row(row);

        write_wide_ndjson(&path, &table).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let line: Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(line["academic_white_count"], Value::Null);
        assert_eq!(line["year"], Value::from(2016));

        let back = read_wide_ndjson(&path).unwrap();
        assert_eq!(back.value("massey", 2016, "academic_total_count"), Some(100.0));
        assert!(back.columns().contains(&"academic_white_count".to_string()));
        assert_eq!(back.value("massey", 2016, "academic_white_count"), None);
    }
}
