use serde::Deserialize;

use crate::error::YearError;

/// Year exactly as it appears in an input record
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawYear {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawYear {
    pub fn resolve(&self) -> Result<i32, YearError> {
        match self {
            RawYear::Int(y) => i32::try_from(*y).map_err(|_| YearError::Unrecognised(y.to_string())),
            RawYear::Float(y) => whole_year(*y).ok_or_else(|| YearError::Unrecognised(y.to_string())),
            RawYear::Text(s) => resolve_year(s),
        }
    }
}

/// Resolve a raw year label to an integer year.
///
/// Accepts `2016`, `2016.0` and academic years `2015/16` or `2015-16`, which
/// resolve to the year they end in.
pub fn resolve_year(raw: &str) -> Result<i32, YearError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(YearError::Empty);
    }
    if let Ok(year) = raw.parse::<i32>() {
        return Ok(year);
    }
    if let Some(year) = raw.parse::<f64>().ok().and_then(whole_year) {
        return Ok(year);
    }
    academic_year(raw).ok_or_else(|| YearError::Unrecognised(raw.to_string()))
}

fn whole_year(value: f64) -> Option<i32> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}

fn academic_year(raw: &str) -> Option<i32> {
    let (start, end) = raw.split_once(|c: char| c == '/' || c == '-')?;
    let (start, end) = (start.trim(), end.trim());
    if start.len() != 4 || !start.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !end.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let start: i32 = start.parse().ok()?;
    let year = match end.len() {
        2 => {
            let mut year = start / 100 * 100 + end.parse::<i32>().ok()?;
            // 1999/00 crosses the century
            if year <= start {
                year += 100;
            }
            year
        }
        4 => end.parse().ok()?,
        _ => return None,
    };
    (year == start + 1).then_some(year)
}
