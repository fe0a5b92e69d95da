use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::filter::filter_by_date_range;
use crate::store::DataStore;
use crate::types::{LogLevel, LogRecord};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub level: Option<LogLevel>,
    pub component: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogReport {
    pub logs: Vec<LogRecord>,
    pub summary: LogSummary,
}

#[derive(Debug, Serialize)]
pub struct LogSummary {
    pub total_count: usize,
    pub level_distribution: BTreeMap<LogLevel, usize>,
    pub date_range: DateRange,
}

#[derive(Debug, Serialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Apply exact-match level/component filters (AND semantics) and tabulate
/// the level distribution over the records that survive.
pub fn classify(
    logs: Vec<LogRecord>,
    level: Option<LogLevel>,
    component: Option<&str>,
) -> (Vec<LogRecord>, BTreeMap<LogLevel, usize>) {
    let filtered: Vec<LogRecord> = logs
        .into_iter()
        .filter(|log| level.map_or(true, |l| log.level == l))
        .filter(|log| component.map_or(true, |c| log.component == c))
        .collect();

    let mut distribution = BTreeMap::new();
    for log in &filtered {
        *distribution.entry(log.level).or_insert(0) += 1;
    }
    (filtered, distribution)
}

/// Fetch application logs for a date window, optionally narrowed by level
/// and component. The distribution is built only over the post-filter set,
/// so a `level` filter degenerates it to a single entry.
pub fn get_application_logs(
    store: &DataStore,
    query: &LogQuery,
) -> Result<LogReport, EngineError> {
    let logs = store.application_logs()?;
    let logs = filter_by_date_range(
        logs,
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    )?;
    let (logs, level_distribution) = classify(logs, query.level, query.component.as_deref());

    let total_count = logs.len();
    Ok(LogReport {
        logs,
        summary: LogSummary {
            total_count,
            level_distribution,
            date_range: DateRange {
                start: query.start_date.clone(),
                end: query.end_date.clone(),
            },
        },
    })
}
