use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::config::ThresholdConfig;
use crate::db::{get_database_status, DbStatusRequest};
use crate::error::EngineError;
use crate::filter::parse_date_arg;
use crate::logs::{get_application_logs, LogQuery, LogSummary};
use crate::metrics::{get_system_metrics, MetricSummary, SystemMetricsRequest};
use crate::store::DataStore;
use crate::types::{HealthStatus, LogLevel};

// Score deductions per check. Checks across categories are independent and
// additive; within the tiered CPU/memory checks only the higher tier fires.
const DEDUCT_USAGE_CRITICAL: i64 = 30;
const DEDUCT_USAGE_HIGH: i64 = 15;
const DEDUCT_CRITICAL_LOGS: i64 = 40;
const DEDUCT_ERROR_LOGS: i64 = 20;
const DEDUCT_SLOW_DB: i64 = 25;

pub const DEFAULT_HOURS_RANGE: i64 = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthRequest {
    pub date: String,
    #[serde(default = "default_hours_range")]
    pub hours_range: i64,
}

fn default_hours_range() -> i64 {
    DEFAULT_HOURS_RANGE
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub date: String,
    pub health_score: i64,
    pub status: HealthStatus,
    pub issues: Vec<String>,
    pub metrics_summary: BTreeMap<String, MetricSummary>,
    pub logs_summary: LogSummary,
    pub db_summary: BTreeMap<String, MetricSummary>,
}

/// Combines metric, log, and (when available) database summaries for a
/// time window into a 0-100 health score with a status tier and a list of
/// human-readable issues.
pub struct HealthAnalyzer {
    thresholds: ThresholdConfig,
}

impl HealthAnalyzer {
    pub fn new(thresholds: &ThresholdConfig) -> Self {
        Self {
            thresholds: thresholds.clone(),
        }
    }

    /// Score the window `[date - hours_range, date + hours_range]`.
    ///
    /// The window is widened to whole-day bounds before filtering, so the
    /// effective granularity is always full days; `hours_range` only
    /// decides which days are swept in near midnight. This coarseness is
    /// deliberate and preserved from the system's original behavior.
    pub fn analyze(
        &self,
        store: &DataStore,
        date: &str,
        hours_range: i64,
    ) -> Result<HealthReport, EngineError> {
        let target = parse_date_arg(date)?;
        let start = (target - Duration::hours(hours_range))
            .format("%Y-%m-%d")
            .to_string();
        let end = (target + Duration::hours(hours_range))
            .format("%Y-%m-%d")
            .to_string();

        let metrics = get_system_metrics(
            store,
            &SystemMetricsRequest {
                start_date: Some(start.clone()),
                end_date: Some(end.clone()),
                ..Default::default()
            },
        )?;
        let logs = get_application_logs(
            store,
            &LogQuery {
                start_date: Some(start.clone()),
                end_date: Some(end.clone()),
                ..Default::default()
            },
        )?;
        let db_summary = if store.has_database() {
            get_database_status(
                store,
                &DbStatusRequest {
                    start_date: Some(start),
                    end_date: Some(end),
                    metric_name: None,
                },
            )?
            .summary
        } else {
            BTreeMap::new()
        };

        let mut score: i64 = 100;
        let mut issues = Vec::new();
        let t = &self.thresholds;

        if let Some(cpu) = metrics.summary.get("cpu_usage") {
            if cpu.max > t.usage_critical_percent {
                score -= DEDUCT_USAGE_CRITICAL;
                issues.push(format!("CPU crítico: {:.1}%", cpu.max));
            } else if cpu.max > t.usage_high_percent {
                score -= DEDUCT_USAGE_HIGH;
                issues.push(format!("CPU alto: {:.1}%", cpu.max));
            }
        }

        if let Some(mem) = metrics.summary.get("memory_usage") {
            if mem.max > t.usage_critical_percent {
                score -= DEDUCT_USAGE_CRITICAL;
                issues.push(format!("Memoria crítica: {:.1}%", mem.max));
            } else if mem.max > t.usage_high_percent {
                score -= DEDUCT_USAGE_HIGH;
                issues.push(format!("Memoria alta: {:.1}%", mem.max));
            }
        }

        let critical_logs = logs
            .summary
            .level_distribution
            .get(&LogLevel::Critical)
            .copied()
            .unwrap_or(0);
        let error_logs = logs
            .summary
            .level_distribution
            .get(&LogLevel::Error)
            .copied()
            .unwrap_or(0);

        if critical_logs > 0 {
            score -= DEDUCT_CRITICAL_LOGS;
            issues.push(format!("Logs críticos encontrados: {}", critical_logs));
        }
        if error_logs > t.error_log_limit {
            score -= DEDUCT_ERROR_LOGS;
            issues.push(format!("Múltiples errores: {}", error_logs));
        }

        if let Some(q) = db_summary.get("query_response_time") {
            if q.avg > t.slow_query_ms {
                score -= DEDUCT_SLOW_DB;
                issues.push(format!("Respuesta DB lenta: {:.0}ms", q.avg));
            }
        }

        // Deductions may drive the raw score negative; the floor is
        // applied once at the end, not per deduction.
        let health_score = score.max(0);
        let status = HealthStatus::from_score(health_score);

        tracing::debug!(date, health_score, status = %status, issues = issues.len(), "Health analysis complete");

        Ok(HealthReport {
            date: date.to_string(),
            health_score,
            status,
            issues,
            metrics_summary: metrics.summary,
            logs_summary: logs.summary,
            db_summary,
        })
    }
}
