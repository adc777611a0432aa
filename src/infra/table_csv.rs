use std::path::Path;

use crate::constants::{COL_INSTITUTION_ID, COL_INSTITUTION_NAME, COL_SOURCE, COL_YEAR};
use crate::error::{PipelineError, Result, RowError};
use crate::pipeline::ingestion::resolve_year;
use crate::pipeline::processing::{WideRow, WideTable};

const KEY_COLUMNS: [&str; 4] = [COL_INSTITUTION_ID, COL_INSTITUTION_NAME, COL_SOURCE, COL_YEAR];

/// Write a wide table as CSV. Null cells are left empty.
pub fn write_wide_csv(path: &Path, table: &WideTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header: Vec<&str> = KEY_COLUMNS.to_vec();
    header.extend(table.columns().iter().map(String::as_str));
    writer.write_record(&header)?;

    for row in table.rows() {
        let mut record = vec![
            row.institution_id.clone(),
            row.institution_name.clone(),
            row.source.clone(),
            row.year.to_string(),
        ];
        record.extend(
            table
                .columns()
                .iter()
                .map(|c| row.value(c).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn read_wide_csv(path: &Path) -> Result<WideTable> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    for (i, key) in KEY_COLUMNS.iter().enumerate() {
        if headers.get(i) != Some(*key) {
            return Err(RowError::MissingField(*key).into());
        }
    }
    let columns: Vec<String> = headers.iter().skip(KEY_COLUMNS.len()).map(str::to_string).collect();
    let mut table = WideTable::new(columns.clone());

    for record in reader.records() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or("");
        let mut row = WideRow::new(field(0), resolve_year(field(3))?, field(2), field(1));
        for (offset, column) in columns.iter().enumerate() {
            let cell = field(KEY_COLUMNS.len() + offset).trim();
            if cell.is_empty() {
                continue;
            }
            let value: f64 = cell.parse().map_err(|_| {
                PipelineError::Row(RowError::Unparseable(format!("{} = '{}'", column, cell)))
            })?;
            row.values.insert(column.clone(), value);
        }
        table.upsert_row(row);
    }

    Ok(table)
}
