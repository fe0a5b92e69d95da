use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use crate::error::EngineError;
use crate::types::{DbMetricSample, LogRecord, MetricSample};

/// Record types that carry an ISO-8601 timestamp string.
pub trait Timestamped {
    fn timestamp(&self) -> &str;
}

impl Timestamped for MetricSample {
    fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

impl Timestamped for DbMetricSample {
    fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

impl Timestamped for LogRecord {
    fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

/// Parse a record timestamp permissively.
///
/// Accepts RFC 3339 with a `Z` marker or explicit offset (normalized to
/// UTC), or a naive `YYYY-MM-DDTHH:MM:SS[.f]` / space-separated variant,
/// which is taken to already be UTC. All comparisons downstream happen in
/// this normalized form, so records with mixed offsets sort and filter
/// chronologically rather than lexically.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, EngineError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_utc());
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt);
        }
    }
    Err(EngineError::InvalidTimestamp(raw.to_string()))
}

/// Parse a caller-supplied date argument: `YYYY-MM-DD` (midnight) or a
/// full naive datetime.
pub fn parse_date_arg(raw: &str) -> Result<NaiveDateTime, EngineError> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map_err(|_| EngineError::InvalidParameter(raw.to_string()))
}

/// Select records whose timestamp falls inside an inclusive day-granular
/// window.
///
/// With both bounds absent this is the identity, preserving element order.
/// `start_date` cuts at midnight; `end_date` is inclusive of its whole day
/// (records strictly before `end_date + 1 day` pass). A record with an
/// unparseable timestamp fails the call rather than being dropped.
pub fn filter_by_date_range<T: Timestamped>(
    records: Vec<T>,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<Vec<T>, EngineError> {
    if start_date.is_none() && end_date.is_none() {
        return Ok(records);
    }

    let start = start_date.map(parse_date_arg).transpose()?;
    let end_exclusive = end_date
        .map(parse_date_arg)
        .transpose()?
        .map(|dt| dt + Duration::days(1));

    let mut filtered = Vec::new();
    for record in records {
        let ts = parse_timestamp(record.timestamp())?;
        if let Some(start) = start {
            if ts < start {
                continue;
            }
        }
        if let Some(end) = end_exclusive {
            if ts >= end {
                continue;
            }
        }
        filtered.push(record);
    }
    Ok(filtered)
}
