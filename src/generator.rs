use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use crate::store::{DB_FILE, LOGS_FILE, METRICS_FILE};
use crate::types::{DbMetric, DbMetricSample, LogLevel, LogRecord, MetricSample};

pub const DEFAULT_SEED: u64 = 42;

const COMPONENTS: &[&str] = &[
    "payment-api",
    "payment-processor",
    "auth-service",
    "database",
    "notification-service",
];

const INFO_MESSAGES: &[&str] = &[
    "Pago procesado correctamente",
    "Sesión de usuario iniciada",
    "Conciliación diaria completada",
    "Notificación enviada al cliente",
];

const WARN_MESSAGES: &[&str] = &[
    "Reintento de conexión a la pasarela de pagos",
    "Latencia elevada en respuesta de API externa",
    "Cola de notificaciones creciendo",
];

const ERROR_MESSAGES: &[&str] = &[
    "Timeout en conexión a base de datos",
    "Fallo al procesar transacción",
    "Error de autenticación con pasarela de pagos",
    "Respuesta inválida del servicio de tarjetas",
];

const CRITICAL_MESSAGES: &[&str] = &[
    "Fallo crítico en procesamiento de pagos",
    "Conexión a base de datos perdida",
];

/// Generate the three synthetic data files over `days` ending today, with
/// one incident day near the middle: CPU and memory pushed over the
/// anomaly thresholds, an error/critical log burst, and slow DB queries.
/// Seeded, so output is reproducible for a given span.
pub fn generate(output_dir: &Path, days: u32) -> Result<()> {
    generate_seeded(output_dir, days, DEFAULT_SEED)
}

pub fn generate_seeded(output_dir: &Path, days: u32, seed: u64) -> Result<()> {
    let days = days.max(1);
    let mut rng = StdRng::seed_from_u64(seed);

    let today = chrono::Utc::now().date_naive();
    let first_day = today - Duration::days(i64::from(days) - 1);
    let incident_day = first_day + Duration::days(i64::from(days) / 2);
    // Incident runs 10:00-14:00 on the incident day
    let incident = |ts: NaiveDateTime| {
        ts.date() == incident_day && (10..14).contains(&ts.time().hour())
    };

    let mut cpu = Vec::new();
    let mut memory = Vec::new();
    let mut logs = Vec::new();
    let mut db = Vec::new();

    let mut ts = first_day.and_hms_opt(0, 0, 0).unwrap_or_default();
    let end = today.and_hms_opt(23, 59, 59).unwrap_or_default();
    while ts <= end {
        let hot = incident(ts);

        cpu.push(sample(ts, if hot {
            rng.gen_range(86.0..99.0)
        } else {
            rng.gen_range(15.0..65.0)
        }));
        memory.push(sample(ts, if hot {
            rng.gen_range(82.0..97.0)
        } else {
            rng.gen_range(35.0..70.0)
        }));

        logs.push(log_record(&mut rng, ts, hot));
        if hot && rng.gen_bool(0.3) {
            logs.push(LogRecord {
                timestamp: fmt(ts + Duration::minutes(7)),
                level: LogLevel::Critical,
                component: "payment-processor".to_string(),
                message: pick(&mut rng, CRITICAL_MESSAGES).to_string(),
            });
        }

        db.push(db_sample(ts, DbMetric::ConnectionCount, rng.gen_range(10.0..80.0)));
        db.push(db_sample(
            ts,
            DbMetric::QueryResponseTime,
            if hot {
                rng.gen_range(1200.0..6500.0)
            } else {
                rng.gen_range(40.0..350.0)
            },
        ));
        db.push(db_sample(ts, DbMetric::ActiveTransactions, rng.gen_range(2.0..45.0)));
        db.push(db_sample(ts, DbMetric::DiskUsage, rng.gen_range(55.0..68.0)));

        ts = ts + Duration::minutes(30);
    }

    write_json(
        &output_dir.join(METRICS_FILE),
        &json!({ "cpu_usage": cpu, "memory_usage": memory }),
    )?;
    write_json(&output_dir.join(LOGS_FILE), &json!({ "application_logs": logs }))?;
    write_json(&output_dir.join(DB_FILE), &json!({ "database_metrics": db }))?;

    tracing::info!(
        dir = %output_dir.display(),
        days,
        incident_day = %incident_day,
        "Synthetic data written"
    );
    Ok(())
}

fn fmt(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn sample(ts: NaiveDateTime, value: f64) -> MetricSample {
    MetricSample {
        timestamp: fmt(ts),
        value: round1(value),
    }
}

fn db_sample(ts: NaiveDateTime, metric: DbMetric, value: f64) -> DbMetricSample {
    DbMetricSample {
        timestamp: fmt(ts),
        metric,
        value: round1(value),
    }
}

fn log_record(rng: &mut StdRng, ts: NaiveDateTime, hot: bool) -> LogRecord {
    let (level, message) = if hot {
        (LogLevel::Error, pick(rng, ERROR_MESSAGES))
    } else if rng.gen_bool(0.12) {
        (LogLevel::Warn, pick(rng, WARN_MESSAGES))
    } else {
        (LogLevel::Info, pick(rng, INFO_MESSAGES))
    };
    LogRecord {
        timestamp: fmt(ts + Duration::minutes(rng.gen_range(0..30))),
        level,
        component: pick(rng, COMPONENTS).to_string(),
        message: message.to_string(),
    }
}

fn pick<'a>(rng: &mut StdRng, options: &[&'a str]) -> &'a str {
    options[rng.gen_range(0..options.len())]
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{AnomalyDetector, HealthAnalyzer};
    use crate::analyzer::anomaly::AnomalyRequest;
    use crate::config::ThresholdConfig;
    use crate::store::DataStore;

    #[test]
    fn generated_data_loads_and_contains_an_incident() {
        let dir = tempfile::tempdir().unwrap();
        generate(dir.path(), 7).unwrap();

        let store = DataStore::new(dir.path());
        store.verify().unwrap();
        assert!(store.has_database());

        let report = AnomalyDetector::new(&ThresholdConfig::default())
            .detect(&store, &AnomalyRequest::default())
            .unwrap();
        assert!(report.summary.type_distribution.contains_key("HIGH_CPU"));
        assert!(report.summary.type_distribution.contains_key("SLOW_DB_QUERY"));

        let incident_day = (chrono::Utc::now().date_naive()
            - chrono::Duration::days(6)
            + chrono::Duration::days(3))
        .format("%Y-%m-%d")
        .to_string();
        let health = HealthAnalyzer::new(&ThresholdConfig::default())
            .analyze(&store, &incident_day, 2)
            .unwrap();
        assert!(health.health_score < 80, "incident day should not be healthy");
        assert!(!health.issues.is_empty());
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        generate_seeded(a.path(), 3, 7).unwrap();
        generate_seeded(b.path(), 3, 7).unwrap();
        for file in [METRICS_FILE, LOGS_FILE, DB_FILE] {
            let left = std::fs::read_to_string(a.path().join(file)).unwrap();
            let right = std::fs::read_to_string(b.path().join(file)).unwrap();
            assert_eq!(left, right, "{file} should be identical across runs");
        }
    }
}
