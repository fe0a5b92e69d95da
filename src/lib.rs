pub mod analyzer;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod generator;
pub mod logs;
pub mod metrics;
pub mod server;
pub mod store;

/// Common types used across modules
pub mod types {
    use serde::{Deserialize, Serialize};

    /// A single CPU or memory measurement from the monitored application.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MetricSample {
        pub timestamp: String,
        pub value: f64,
    }

    /// A database status measurement, keyed by metric name.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DbMetricSample {
        pub timestamp: String,
        pub metric: DbMetric,
        pub value: f64,
    }

    /// Database metric identifier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum DbMetric {
        ConnectionCount,
        QueryResponseTime,
        ActiveTransactions,
        DiskUsage,
    }

    /// A structured application log record.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct LogRecord {
        pub timestamp: String,
        pub level: LogLevel,
        pub component: String,
        pub message: String,
    }

    /// Application log levels
    #[derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    )]
    #[serde(rename_all = "UPPERCASE")]
    pub enum LogLevel {
        Info,
        Warn,
        Error,
        Critical,
    }

    /// Anomaly severity tiers
    #[derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    )]
    #[serde(rename_all = "UPPERCASE")]
    pub enum Severity {
        High,
        Critical,
    }

    /// Coarse health classification derived from the health score.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "UPPERCASE")]
    pub enum HealthStatus {
        Healthy,
        Warning,
        Critical,
        Failed,
    }

    impl HealthStatus {
        /// Status breakpoints are inclusive on the lower edge of each tier.
        pub fn from_score(score: i64) -> Self {
            if score >= 80 {
                HealthStatus::Healthy
            } else if score >= 60 {
                HealthStatus::Warning
            } else if score >= 40 {
                HealthStatus::Critical
            } else {
                HealthStatus::Failed
            }
        }
    }

    impl std::fmt::Display for LogLevel {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                LogLevel::Info => write!(f, "INFO"),
                LogLevel::Warn => write!(f, "WARN"),
                LogLevel::Error => write!(f, "ERROR"),
                LogLevel::Critical => write!(f, "CRITICAL"),
            }
        }
    }

    impl std::fmt::Display for Severity {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Severity::High => write!(f, "HIGH"),
                Severity::Critical => write!(f, "CRITICAL"),
            }
        }
    }

    impl std::fmt::Display for HealthStatus {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                HealthStatus::Healthy => write!(f, "HEALTHY"),
                HealthStatus::Warning => write!(f, "WARNING"),
                HealthStatus::Critical => write!(f, "CRITICAL"),
                HealthStatus::Failed => write!(f, "FAILED"),
            }
        }
    }

    impl std::fmt::Display for DbMetric {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            let s = match self {
                DbMetric::ConnectionCount => "connection_count",
                DbMetric::QueryResponseTime => "query_response_time",
                DbMetric::ActiveTransactions => "active_transactions",
                DbMetric::DiskUsage => "disk_usage",
            };
            write!(f, "{}", s)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn status_breakpoints_inclusive_on_lower_edge() {
            assert_eq!(HealthStatus::from_score(100), HealthStatus::Healthy);
            assert_eq!(HealthStatus::from_score(80), HealthStatus::Healthy);
            assert_eq!(HealthStatus::from_score(79), HealthStatus::Warning);
            assert_eq!(HealthStatus::from_score(60), HealthStatus::Warning);
            assert_eq!(HealthStatus::from_score(59), HealthStatus::Critical);
            assert_eq!(HealthStatus::from_score(40), HealthStatus::Critical);
            assert_eq!(HealthStatus::from_score(39), HealthStatus::Failed);
            assert_eq!(HealthStatus::from_score(0), HealthStatus::Failed);
        }

        #[test]
        fn log_level_wire_format_is_uppercase() {
            let rec: LogRecord = serde_json::from_str(
                r#"{"timestamp":"2024-04-15T10:00:00Z","level":"ERROR","component":"payment-api","message":"timeout"}"#,
            )
            .unwrap();
            assert_eq!(rec.level, LogLevel::Error);
            let json = serde_json::to_string(&rec.level).unwrap();
            assert_eq!(json, r#""ERROR""#);
        }

        #[test]
        fn db_metric_wire_format_is_snake_case() {
            let m: DbMetric = serde_json::from_str(r#""query_response_time""#).unwrap();
            assert_eq!(m, DbMetric::QueryResponseTime);
            assert_eq!(m.to_string(), "query_response_time");
        }
    }
}
