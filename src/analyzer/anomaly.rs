use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::ThresholdConfig;
use crate::error::EngineError;
use crate::filter::{filter_by_date_range, parse_timestamp};
use crate::logs::DateRange;
use crate::store::DataStore;
use crate::types::{DbMetric, LogLevel, Severity};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnomalyRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// A single flagged data point or log event.
#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    pub timestamp: String,
    #[serde(flatten)]
    pub detail: AnomalyDetail,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyDetail {
    HighCpu { value: f64, threshold: f64 },
    HighMemory { value: f64, threshold: f64 },
    CriticalLog { message: String, component: String },
    ErrorLog { message: String, component: String },
    SlowDbQuery { value: f64, threshold: f64 },
}

impl AnomalyDetail {
    pub fn type_name(&self) -> &'static str {
        match self {
            AnomalyDetail::HighCpu { .. } => "HIGH_CPU",
            AnomalyDetail::HighMemory { .. } => "HIGH_MEMORY",
            AnomalyDetail::CriticalLog { .. } => "CRITICAL_LOG",
            AnomalyDetail::ErrorLog { .. } => "ERROR_LOG",
            AnomalyDetail::SlowDbQuery { .. } => "SLOW_DB_QUERY",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<Anomaly>,
    pub summary: AnomalySummary,
}

#[derive(Debug, Serialize)]
pub struct AnomalySummary {
    pub total_count: usize,
    pub severity_distribution: BTreeMap<Severity, usize>,
    pub type_distribution: BTreeMap<String, usize>,
    pub date_range: DateRange,
}

/// Scans raw, unaggregated samples and log records against fixed
/// thresholds and emits a chronologically ordered list of typed anomalies.
///
/// CPU and memory checks are independent: a simultaneous spike yields two
/// entries. The DB-derived checks (ERROR_LOG, SLOW_DB_QUERY) only run when
/// the store has a database source; a deployment without one omits them
/// rather than failing.
pub struct AnomalyDetector {
    thresholds: ThresholdConfig,
}

impl AnomalyDetector {
    pub fn new(thresholds: &ThresholdConfig) -> Self {
        Self {
            thresholds: thresholds.clone(),
        }
    }

    pub fn detect(
        &self,
        store: &DataStore,
        req: &AnomalyRequest,
    ) -> Result<AnomalyReport, EngineError> {
        let start = req.start_date.as_deref();
        let end = req.end_date.as_deref();
        let t = &self.thresholds;

        // Keyed by parsed timestamp so ordering is chronological even when
        // sources mix UTC offsets.
        let mut entries: Vec<(NaiveDateTime, Anomaly)> = Vec::new();

        let data = store.system_metrics()?;
        for sample in filter_by_date_range(data.cpu_usage, start, end)? {
            if sample.value > t.metric_anomaly_percent {
                entries.push((
                    parse_timestamp(&sample.timestamp)?,
                    Anomaly {
                        timestamp: sample.timestamp,
                        detail: AnomalyDetail::HighCpu {
                            value: sample.value,
                            threshold: t.metric_anomaly_percent,
                        },
                        severity: self.metric_severity(sample.value),
                    },
                ));
            }
        }
        for sample in filter_by_date_range(data.memory_usage, start, end)? {
            if sample.value > t.metric_anomaly_percent {
                entries.push((
                    parse_timestamp(&sample.timestamp)?,
                    Anomaly {
                        timestamp: sample.timestamp,
                        detail: AnomalyDetail::HighMemory {
                            value: sample.value,
                            threshold: t.metric_anomaly_percent,
                        },
                        severity: self.metric_severity(sample.value),
                    },
                ));
            }
        }

        let has_db = store.has_database();
        let logs = filter_by_date_range(store.application_logs()?, start, end)?;
        for log in logs {
            match log.level {
                LogLevel::Critical => entries.push((
                    parse_timestamp(&log.timestamp)?,
                    Anomaly {
                        timestamp: log.timestamp,
                        detail: AnomalyDetail::CriticalLog {
                            message: log.message,
                            component: log.component,
                        },
                        severity: Severity::Critical,
                    },
                )),
                LogLevel::Error if has_db => entries.push((
                    parse_timestamp(&log.timestamp)?,
                    Anomaly {
                        timestamp: log.timestamp,
                        detail: AnomalyDetail::ErrorLog {
                            message: log.message,
                            component: log.component,
                        },
                        severity: Severity::High,
                    },
                )),
                _ => {}
            }
        }

        if has_db {
            let db = filter_by_date_range(store.database_metrics()?, start, end)?;
            for sample in db {
                if sample.metric == DbMetric::QueryResponseTime && sample.value > t.slow_query_ms {
                    let severity = if sample.value > t.slow_query_critical_ms {
                        Severity::Critical
                    } else {
                        Severity::High
                    };
                    entries.push((
                        parse_timestamp(&sample.timestamp)?,
                        Anomaly {
                            timestamp: sample.timestamp,
                            detail: AnomalyDetail::SlowDbQuery {
                                value: sample.value,
                                threshold: t.slow_query_ms,
                            },
                            severity,
                        },
                    ));
                }
            }
        }

        // Stable sort: entries with equal timestamps keep source order.
        // No deduplication; identical anomalies from different sources
        // remain distinct.
        entries.sort_by_key(|(ts, _)| *ts);
        let anomalies: Vec<Anomaly> = entries.into_iter().map(|(_, a)| a).collect();

        let mut severity_distribution = BTreeMap::new();
        let mut type_distribution = BTreeMap::new();
        for anomaly in &anomalies {
            *severity_distribution.entry(anomaly.severity).or_insert(0) += 1;
            *type_distribution
                .entry(anomaly.detail.type_name().to_string())
                .or_insert(0) += 1;
        }

        tracing::debug!(count = anomalies.len(), "Anomaly detection complete");

        Ok(AnomalyReport {
            summary: AnomalySummary {
                total_count: anomalies.len(),
                severity_distribution,
                type_distribution,
                date_range: DateRange {
                    start: req.start_date.clone(),
                    end: req.end_date.clone(),
                },
            },
            anomalies,
        })
    }

    fn metric_severity(&self, value: f64) -> Severity {
        if value > self.thresholds.metric_critical_percent {
            Severity::Critical
        } else {
            Severity::High
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::store_with;

    const EMPTY_LOGS: &str = r#"{"application_logs":[]}"#;

    fn detect(
        metrics: &str,
        logs: &str,
        db: Option<&str>,
        req: &AnomalyRequest,
    ) -> AnomalyReport {
        let (_dir, store) = store_with(metrics, logs, db);
        AnomalyDetector::new(&ThresholdConfig::default())
            .detect(&store, req)
            .unwrap()
    }

    #[test]
    fn single_cpu_spike_is_flagged_critical() {
        let report = detect(
            r#"{"cpu_usage":[{"timestamp":"2024-04-15T10:00:00Z","value":96.0}],"memory_usage":[]}"#,
            EMPTY_LOGS,
            None,
            &AnomalyRequest::default(),
        );
        assert_eq!(report.anomalies.len(), 1);
        let anomaly = &report.anomalies[0];
        assert_eq!(anomaly.severity, Severity::Critical);
        match &anomaly.detail {
            AnomalyDetail::HighCpu { value, threshold } => {
                assert_eq!(*value, 96.0);
                assert_eq!(*threshold, 85.0);
            }
            other => panic!("expected HIGH_CPU, got {other:?}"),
        }
        assert_eq!(report.summary.severity_distribution[&Severity::Critical], 1);
        assert_eq!(report.summary.type_distribution["HIGH_CPU"], 1);
    }

    #[test]
    fn severity_tier_splits_at_95() {
        let report = detect(
            r#"{"cpu_usage":[
                {"timestamp":"2024-04-15T10:00:00Z","value":90.0},
                {"timestamp":"2024-04-15T11:00:00Z","value":95.0},
                {"timestamp":"2024-04-15T12:00:00Z","value":95.1}
            ],"memory_usage":[]}"#,
            EMPTY_LOGS,
            None,
            &AnomalyRequest::default(),
        );
        assert_eq!(report.anomalies.len(), 3);
        assert_eq!(report.anomalies[0].severity, Severity::High);
        assert_eq!(report.anomalies[1].severity, Severity::High);
        assert_eq!(report.anomalies[2].severity, Severity::Critical);
    }

    #[test]
    fn simultaneous_cpu_and_memory_spikes_are_distinct_entries() {
        let report = detect(
            r#"{"cpu_usage":[{"timestamp":"2024-04-15T10:00:00Z","value":97.0}],
                "memory_usage":[{"timestamp":"2024-04-15T10:00:00Z","value":91.0}]}"#,
            EMPTY_LOGS,
            None,
            &AnomalyRequest::default(),
        );
        assert_eq!(report.anomalies.len(), 2);
        assert_eq!(report.summary.type_distribution["HIGH_CPU"], 1);
        assert_eq!(report.summary.type_distribution["HIGH_MEMORY"], 1);
    }

    #[test]
    fn output_is_chronological_across_sources() {
        let metrics = r#"{"cpu_usage":[
            {"timestamp":"2024-04-15T14:00:00Z","value":96.0},
            {"timestamp":"2024-04-15T08:00:00Z","value":88.0}
        ],"memory_usage":[{"timestamp":"2024-04-15T11:00:00Z","value":90.0}]}"#;
        let logs = r#"{"application_logs":[
            {"timestamp":"2024-04-15T09:30:00Z","level":"CRITICAL","component":"database","message":"conexión perdida"}
        ]}"#;
        let db = r#"{"database_metrics":[
            {"timestamp":"2024-04-15T12:15:00Z","metric":"query_response_time","value":1800.0}
        ]}"#;
        let report = detect(metrics, logs, Some(db), &AnomalyRequest::default());

        let times: Vec<&str> = report
            .anomalies
            .iter()
            .map(|a| a.timestamp.as_str())
            .collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        assert_eq!(report.summary.total_count, 5);
    }

    #[test]
    fn offset_timestamps_sort_chronologically_not_lexically() {
        // Lexically "2024-04-15T07:00:00-05:00" < "2024-04-15T11:00:00Z",
        // but chronologically it is 12:00 UTC, after it.
        let metrics = r#"{"cpu_usage":[
            {"timestamp":"2024-04-15T07:00:00-05:00","value":96.0},
            {"timestamp":"2024-04-15T11:00:00Z","value":96.0}
        ],"memory_usage":[]}"#;
        let report = detect(metrics, EMPTY_LOGS, None, &AnomalyRequest::default());
        assert_eq!(report.anomalies[0].timestamp, "2024-04-15T11:00:00Z");
        assert_eq!(report.anomalies[1].timestamp, "2024-04-15T07:00:00-05:00");
    }

    #[test]
    fn db_derived_checks_are_omitted_without_a_database() {
        let logs = r#"{"application_logs":[
            {"timestamp":"2024-04-15T10:00:00Z","level":"ERROR","component":"payment-api","message":"timeout"},
            {"timestamp":"2024-04-15T11:00:00Z","level":"CRITICAL","component":"database","message":"conexión perdida"}
        ]}"#;
        let report = detect(
            r#"{"cpu_usage":[],"memory_usage":[]}"#,
            logs,
            None,
            &AnomalyRequest::default(),
        );
        // CRITICAL_LOG still fires; ERROR_LOG needs the database-aware
        // variant and is skipped.
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.anomalies[0].detail.type_name(), "CRITICAL_LOG");
    }

    #[test]
    fn error_logs_and_slow_queries_fire_with_a_database() {
        let logs = r#"{"application_logs":[
            {"timestamp":"2024-04-15T10:00:00Z","level":"ERROR","component":"payment-api","message":"timeout"}
        ]}"#;
        let db = r#"{"database_metrics":[
            {"timestamp":"2024-04-15T10:05:00Z","metric":"query_response_time","value":6000.0},
            {"timestamp":"2024-04-15T10:10:00Z","metric":"query_response_time","value":900.0},
            {"timestamp":"2024-04-15T10:15:00Z","metric":"connection_count","value":5000.0}
        ]}"#;
        let report = detect(
            r#"{"cpu_usage":[],"memory_usage":[]}"#,
            logs,
            Some(db),
            &AnomalyRequest::default(),
        );
        assert_eq!(report.summary.type_distribution["ERROR_LOG"], 1);
        assert_eq!(report.summary.type_distribution["SLOW_DB_QUERY"], 1);
        // Only query_response_time is checked; other DB metrics pass through
        assert!(!report.summary.type_distribution.contains_key("HIGH_CPU"));
        let slow = report
            .anomalies
            .iter()
            .find(|a| a.detail.type_name() == "SLOW_DB_QUERY")
            .unwrap();
        assert_eq!(slow.severity, Severity::Critical);
    }

    #[test]
    fn date_window_limits_the_scan() {
        let metrics = r#"{"cpu_usage":[
            {"timestamp":"2024-04-14T10:00:00Z","value":96.0},
            {"timestamp":"2024-04-15T10:00:00Z","value":96.0}
        ],"memory_usage":[]}"#;
        let req = AnomalyRequest {
            start_date: Some("2024-04-15".to_string()),
            end_date: Some("2024-04-15".to_string()),
        };
        let report = detect(metrics, EMPTY_LOGS, None, &req);
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.anomalies[0].timestamp, "2024-04-15T10:00:00Z");
        assert_eq!(report.summary.date_range.start.as_deref(), Some("2024-04-15"));
    }

    #[test]
    fn anomaly_json_shape_is_flat() {
        let report = detect(
            r#"{"cpu_usage":[{"timestamp":"2024-04-15T10:00:00Z","value":96.0}],"memory_usage":[]}"#,
            EMPTY_LOGS,
            None,
            &AnomalyRequest::default(),
        );
        let json = serde_json::to_value(&report.anomalies[0]).unwrap();
        assert_eq!(json["type"], "HIGH_CPU");
        assert_eq!(json["value"], 96.0);
        assert_eq!(json["threshold"], 85.0);
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["timestamp"], "2024-04-15T10:00:00Z");
    }
}
