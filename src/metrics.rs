use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::filter::filter_by_date_range;
use crate::store::DataStore;
use crate::types::MetricSample;

/// Aggregate statistics for one metric series over a query window.
/// Recomputed on every call; absence (an empty series) is an `Option`, not
/// a zero-filled summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub count: usize,
}

/// Reduce a series of samples to {avg, max, min, count}.
/// Values are taken at face value from the source series: no outlier
/// rejection, no unit conversion.
pub fn summarize(samples: &[MetricSample]) -> Option<MetricSummary> {
    summarize_values(samples.iter().map(|s| s.value))
}

pub fn summarize_values(values: impl IntoIterator<Item = f64>) -> Option<MetricSummary> {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    for v in values {
        count += 1;
        sum += v;
        max = max.max(v);
        min = min.min(v);
    }
    if count == 0 {
        return None;
    }
    Some(MetricSummary {
        avg: sum / count as f64,
        max,
        min,
        count,
    })
}

/// Which system metric series to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    CpuUsage,
    MemoryUsage,
    #[default]
    Both,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemMetricsRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub metric_type: MetricType,
}

#[derive(Debug, Serialize)]
pub struct SystemMetricsReport {
    pub metrics: BTreeMap<String, Vec<MetricSample>>,
    pub summary: BTreeMap<String, MetricSummary>,
}

/// Fetch CPU and/or memory series for a date window, with per-series
/// summaries. A series that is empty after filtering still appears under
/// `metrics`, but contributes no `summary` entry.
pub fn get_system_metrics(
    store: &DataStore,
    req: &SystemMetricsRequest,
) -> Result<SystemMetricsReport, EngineError> {
    let data = store.system_metrics()?;

    let mut report = SystemMetricsReport {
        metrics: BTreeMap::new(),
        summary: BTreeMap::new(),
    };

    if matches!(req.metric_type, MetricType::CpuUsage | MetricType::Both) {
        let cpu = filter_by_date_range(
            data.cpu_usage,
            req.start_date.as_deref(),
            req.end_date.as_deref(),
        )?;
        if let Some(summary) = summarize(&cpu) {
            report.summary.insert("cpu_usage".to_string(), summary);
        }
        report.metrics.insert("cpu_usage".to_string(), cpu);
    }

    if matches!(req.metric_type, MetricType::MemoryUsage | MetricType::Both) {
        let memory = filter_by_date_range(
            data.memory_usage,
            req.start_date.as_deref(),
            req.end_date.as_deref(),
        )?;
        if let Some(summary) = summarize(&memory) {
            report.summary.insert("memory_usage".to_string(), summary);
        }
        report.metrics.insert("memory_usage".to_string(), memory);
    }

    Ok(report)
}
