use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::EngineError;
use crate::types::{DbMetricSample, LogRecord, MetricSample};

pub const METRICS_FILE: &str = "metricas.json";
pub const LOGS_FILE: &str = "logs.json";
pub const DB_FILE: &str = "db.json";

/// Read-only access to the monitoring data sets on disk.
///
/// Every call re-reads its file: the engine is a pure function of the data
/// handed to it for a given query, so nothing is cached between
/// invocations. The database file is optional; callers that need it probe
/// `has_database` first and omit DB-derived checks when it is absent.
#[derive(Debug, Clone)]
pub struct DataStore {
    data_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct SystemMetricsData {
    pub cpu_usage: Vec<MetricSample>,
    pub memory_usage: Vec<MetricSample>,
}

#[derive(Deserialize)]
struct LogData {
    application_logs: Vec<LogRecord>,
}

#[derive(Deserialize)]
struct DbData {
    database_metrics: Vec<DbMetricSample>,
}

impl DataStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn system_metrics(&self) -> Result<SystemMetricsData, EngineError> {
        self.load(METRICS_FILE)
    }

    pub fn application_logs(&self) -> Result<Vec<LogRecord>, EngineError> {
        let data: LogData = self.load(LOGS_FILE)?;
        Ok(data.application_logs)
    }

    pub fn database_metrics(&self) -> Result<Vec<DbMetricSample>, EngineError> {
        let data: DbData = self.load(DB_FILE)?;
        Ok(data.database_metrics)
    }

    pub fn has_database(&self) -> bool {
        self.data_dir.join(DB_FILE).is_file()
    }

    /// Check that the required data files exist and parse. Used by the
    /// CLI `--check` mode before the server starts serving requests.
    pub fn verify(&self) -> Result<(), EngineError> {
        self.system_metrics()?;
        self.application_logs()?;
        if self.has_database() {
            self.database_metrics()?;
        }
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, file: &str) -> Result<T, EngineError> {
        let path = self.data_dir.join(file);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::DataNotFound {
                    file: file.to_string(),
                    dir: self.data_dir.clone(),
                }
            } else {
                EngineError::Io {
                    file: file.to_string(),
                    source: e,
                }
            }
        })?;
        serde_json::from_str(&raw).map_err(|e| EngineError::DataCorrupt {
            file: file.to_string(),
            reason: e.to_string(),
        })
    }
}
