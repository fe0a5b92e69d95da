use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::filter::filter_by_date_range;
use crate::metrics::{summarize_values, MetricSummary};
use crate::store::DataStore;
use crate::types::{DbMetric, DbMetricSample};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DbStatusRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub metric_name: Option<DbMetric>,
}

#[derive(Debug, Serialize)]
pub struct DbStatusReport {
    pub metrics: BTreeMap<String, Vec<DbMetricSample>>,
    pub summary: BTreeMap<String, MetricSummary>,
}

/// Fetch database status metrics for a date window, grouped by metric
/// name, with a summary per group. Empty groups contribute neither a
/// series nor a summary entry.
pub fn get_database_status(
    store: &DataStore,
    req: &DbStatusRequest,
) -> Result<DbStatusReport, EngineError> {
    let samples = store.database_metrics()?;
    let samples = filter_by_date_range(
        samples,
        req.start_date.as_deref(),
        req.end_date.as_deref(),
    )?;

    let mut grouped: BTreeMap<String, Vec<DbMetricSample>> = BTreeMap::new();
    for sample in samples {
        if let Some(wanted) = req.metric_name {
            if sample.metric != wanted {
                continue;
            }
        }
        grouped.entry(sample.metric.to_string()).or_default().push(sample);
    }

    let mut summary = BTreeMap::new();
    for (name, group) in &grouped {
        if let Some(s) = summarize_values(group.iter().map(|m| m.value)) {
            summary.insert(name.clone(), s);
        }
    }

    Ok(DbStatusReport {
        metrics: grouped,
        summary,
    })
}
