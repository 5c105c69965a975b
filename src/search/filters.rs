//! Metadata filter vocabulary and its translation to SQL predicates.
//!
//! Requests arrive as loosely typed JSON (`FilterRequest`) and are validated into
//! a `MetadataFilter`. Malformed `date_range`, `file_size` or `top_k` values are
//! rejected with `RagchatError::InvalidFilter` instead of being dropped.

use crate::error::{RagchatError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A filter value that may be sent as a JSON number or string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Int(i64),
    Text(String),
}

impl FilterValue {
    fn as_text(&self) -> String {
        match self {
            FilterValue::Int(n) => n.to_string(),
            FilterValue::Text(s) => s.trim().to_string(),
        }
    }
}

/// Filters as received from a caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub date_range: Option<String>,
    #[serde(default)]
    pub file_size: Option<FilterValue>,
    #[serde(default)]
    pub top_k: Option<FilterValue>,
}

impl FilterRequest {
    /// True when no key carries a non-blank value
    pub fn is_empty(&self) -> bool {
        fn blank(s: &Option<String>) -> bool {
            s.as_deref().map(|v| v.trim().is_empty()).unwrap_or(true)
        }
        blank(&self.file_type)
            && blank(&self.source_file)
            && blank(&self.date_range)
            && self.file_size.is_none()
            && self.top_k.is_none()
    }
}

/// Validated predicate over chunk metadata; every bound is inclusive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    pub file_type: Option<String>,
    pub source_file: Option<String>,
    /// Unix seconds
    pub modified_from: Option<i64>,
    pub modified_to: Option<i64>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub top_k: Option<usize>,
}

impl MetadataFilter {
    /// Validate a request; relative date windows end at `now`
    pub fn parse(request: &FilterRequest, now: DateTime<Utc>) -> Result<Self> {
        let mut filter = MetadataFilter {
            file_type: non_blank(&request.file_type).map(|t| t.trim_start_matches('.').to_lowercase()),
            source_file: non_blank(&request.source_file),
            ..Default::default()
        };

        if let Some(range) = non_blank(&request.date_range) {
            let (start, end) = parse_date_range(&range, now)?;
            filter.modified_from = Some(start.timestamp());
            filter.modified_to = Some(end.timestamp());
        }

        if let Some(size) = &request.file_size {
            let (min, max) = parse_size_range(&size.as_text())?;
            filter.min_size = min;
            filter.max_size = max;
        }

        if let Some(top_k) = &request.top_k {
            let raw = top_k.as_text();
            let k: usize = raw
                .parse()
                .map_err(|_| RagchatError::invalid_filter("top_k", &raw, "expected a positive integer"))?;
            if k == 0 {
                return Err(RagchatError::invalid_filter("top_k", &raw, "must be at least 1"));
            }
            filter.top_k = Some(k);
        }

        Ok(filter)
    }

    /// True when the filter restricts nothing besides the result count
    pub fn is_unrestricted(&self) -> bool {
        self.file_type.is_none()
            && self.source_file.is_none()
            && self.modified_from.is_none()
            && self.modified_to.is_none()
            && self.min_size.is_none()
            && self.max_size.is_none()
    }

    /// `AND ...` clauses over `alias` with anonymous `?` placeholders, and their values in order
    pub(crate) fn sql_predicate(&self, alias: &str) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut values = Vec::new();

        if let Some(file_type) = &self.file_type {
            sql.push_str(&format!(" AND {}.file_type = ?", alias));
            values.push(Value::Text(file_type.clone()));
        }
        if let Some(source_file) = &self.source_file {
            sql.push_str(&format!(" AND {}.source_file = ?", alias));
            values.push(Value::Text(source_file.clone()));
        }
        if let Some(from) = self.modified_from {
            sql.push_str(&format!(" AND {}.modified_time >= ?", alias));
            values.push(Value::Integer(from));
        }
        if let Some(to) = self.modified_to {
            sql.push_str(&format!(" AND {}.modified_time <= ?", alias));
            values.push(Value::Integer(to));
        }
        if let Some(min) = self.min_size {
            sql.push_str(&format!(" AND {}.file_size >= ?", alias));
            values.push(Value::Integer(i64::try_from(min).unwrap_or(i64::MAX)));
        }
        if let Some(max) = self.max_size {
            sql.push_str(&format!(" AND {}.file_size <= ?", alias));
            values.push(Value::Integer(i64::try_from(max).unwrap_or(i64::MAX)));
        }

        (sql, values)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolve `last_week` / `last_month` / `last_year` or `<start>:<end>`
pub fn parse_date_range(value: &str, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let window = match value {
        "last_week" => Some(7),
        "last_month" => Some(30),
        "last_year" => Some(365),
        _ => None,
    };
    if let Some(days) = window {
        return Ok((now - Duration::days(days), now));
    }

    // ISO datetimes contain ':' themselves, so try every split point
    for (idx, _) in value.match_indices(':') {
        let (left, right) = (&value[..idx], &value[idx + 1..]);
        if let (Some(start), Some(end)) = (parse_instant(left, false), parse_instant(right, true)) {
            if start > end {
                return Err(RagchatError::invalid_filter("date_range", value, "start is after end"));
            }
            return Ok((start, end));
        }
    }

    Err(RagchatError::invalid_filter(
        "date_range",
        value,
        "expected last_week, last_month, last_year or <start>:<end> ISO dates",
    ))
}

/// Parse one side of a date range; bare dates expand to the start or end of that day
fn parse_instant(raw: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = if end_of_day {
            NaiveTime::from_hms_opt(23, 59, 59)?
        } else {
            NaiveTime::from_hms_opt(0, 0, 0)?
        };
        return Some(Utc.from_utc_datetime(&date.and_time(time)));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse `min:max`, `min:`, `:max` or a bare `min` (bytes, inclusive)
pub fn parse_size_range(value: &str) -> Result<(Option<u64>, Option<u64>)> {
    let parse_bound = |s: &str| -> Result<Option<u64>> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        let bytes = s
            .parse::<u64>()
            .map_err(|_| RagchatError::invalid_filter("file_size", value, format!("{:?} is not a byte count", s)))?;
        // SQLite integers are signed 64-bit
        if i64::try_from(bytes).is_err() {
            return Err(RagchatError::invalid_filter("file_size", value, format!("{} is out of range", s)));
        }
        Ok(Some(bytes))
    };

    let (min, max) = match value.split_once(':') {
        Some((min, max)) => (parse_bound(min)?, parse_bound(max)?),
        None => (parse_bound(value)?, None),
    };

    if min.is_none() && max.is_none() {
        return Err(RagchatError::invalid_filter("file_size", value, "no bound given"));
    }
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(RagchatError::invalid_filter("file_size", value, "min is greater than max"));
        }
    }
    Ok((min, max))
}

/// Filter name to human-readable description
pub fn available_filters() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("file_type", "Tipo de archivo (pdf, docx, txt, md)"),
        ("source_file", "Nombre específico del archivo"),
        (
            "date_range",
            "Rango de fechas (last_week, last_month, last_year, o formato YYYY-MM-DD:YYYY-MM-DD)",
        ),
        ("file_size", "Tamaño del archivo en bytes (min:max, min: o solo min)"),
        ("top_k", "Número de resultados (por defecto 5)"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn request(json: &str) -> FilterRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_size_range_inclusive_bounds() {
        assert_eq!(parse_size_range("100:500").unwrap(), (Some(100), Some(500)));
        assert_eq!(parse_size_range("100").unwrap(), (Some(100), None));
        assert_eq!(parse_size_range("100:").unwrap(), (Some(100), None));
        assert_eq!(parse_size_range(":500").unwrap(), (None, Some(500)));
    }

    #[test]
    fn test_size_range_rejects_garbage() {
        assert!(parse_size_range("abc").is_err());
        assert!(parse_size_range("500:100").is_err());
        assert!(parse_size_range(":").is_err());
        assert!(parse_size_range("-5").is_err());
        assert!(parse_size_range("10000000000000000000").is_err());
        assert!(parse_size_range(":10000000000000000000").is_err());
        assert_eq!(
            parse_size_range(&i64::MAX.to_string()).unwrap(),
            (Some(i64::MAX as u64), None)
        );
    }

    #[test]
    fn test_last_week_window() {
        let (start, end) = parse_date_range("last_week", now()).unwrap();
        assert_eq!(end, now());
        assert_eq!(end - start, Duration::days(7));

        let (start, _) = parse_date_range("last_year", now()).unwrap();
        assert_eq!(now() - start, Duration::days(365));
    }

    #[test]
    fn test_literal_date_range_covers_whole_days() {
        let (start, end) = parse_date_range("2024-01-01:2024-12-31", now()).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_datetime_range_with_colons() {
        let (start, end) = parse_date_range("2024-01-01T08:30:00:2024-01-02T18:00:00", now()).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 8, 30, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 1, 2, 18, 0, 0).unwrap());
    }

    #[test]
    fn test_malformed_date_range_is_error() {
        let err = parse_date_range("yesterday", now()).unwrap_err();
        assert!(matches!(err, RagchatError::InvalidFilter { ref key, .. } if key == "date_range"));
        assert!(parse_date_range("2024-12-31:2024-01-01", now()).is_err());
    }

    #[test]
    fn test_parse_request_with_numbers_and_strings() {
        let filter = MetadataFilter::parse(
            &request(r#"{"file_type": ".PDF", "file_size": 100, "top_k": "3"}"#),
            now(),
        )
        .unwrap();
        assert_eq!(filter.file_type.as_deref(), Some("pdf"));
        assert_eq!(filter.min_size, Some(100));
        assert_eq!(filter.max_size, None);
        assert_eq!(filter.top_k, Some(3));
    }

    #[test]
    fn test_parse_request_rejects_zero_top_k() {
        assert!(MetadataFilter::parse(&request(r#"{"top_k": 0}"#), now()).is_err());
    }

    #[test]
    fn test_blank_values_ignored() {
        let req = request(r#"{"file_type": "  ", "date_range": ""}"#);
        assert!(req.is_empty());
        let filter = MetadataFilter::parse(&req, now()).unwrap();
        assert!(filter.is_unrestricted());
    }

    #[test]
    fn test_sql_predicate_order_matches_values() {
        let filter = MetadataFilter {
            file_type: Some("pdf".to_string()),
            min_size: Some(10),
            max_size: Some(20),
            ..Default::default()
        };
        let (sql, values) = filter.sql_predicate("c");
        assert_eq!(sql, " AND c.file_type = ? AND c.file_size >= ? AND c.file_size <= ?");
        assert_eq!(
            values,
            vec![Value::Text("pdf".to_string()), Value::Integer(10), Value::Integer(20)]
        );
    }

    #[test]
    fn test_available_filters_lists_top_k() {
        let filters = available_filters();
        for key in ["file_type", "source_file", "date_range", "file_size", "top_k"] {
            assert!(filters.contains_key(key));
        }
    }
}
