use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_server_name")]
    pub server_name: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            server_name: default_server_name(),
        }
    }
}

/// Fixed thresholds driving anomaly detection and health scoring.
/// Defaults match the contract the tools expose; overriding them changes
/// which samples are flagged and which deductions fire, not the deduction
/// amounts themselves.
#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdConfig {
    /// Per-sample anomaly threshold for CPU and memory (percent)
    #[serde(default = "default_85")]
    pub metric_anomaly_percent: f64,
    /// Above this a metric anomaly is CRITICAL rather than HIGH
    #[serde(default = "default_95")]
    pub metric_critical_percent: f64,
    /// Window-max scoring tiers for CPU and memory (percent)
    #[serde(default = "default_75")]
    pub usage_high_percent: f64,
    #[serde(default = "default_90")]
    pub usage_critical_percent: f64,
    /// ERROR log count above which the score is deducted
    #[serde(default = "default_error_limit")]
    pub error_log_limit: usize,
    /// DB query response time thresholds (milliseconds)
    #[serde(default = "default_1000")]
    pub slow_query_ms: f64,
    #[serde(default = "default_5000")]
    pub slow_query_critical_ms: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            metric_anomaly_percent: 85.0,
            metric_critical_percent: 95.0,
            usage_high_percent: 75.0,
            usage_critical_percent: 90.0,
            error_log_limit: 5,
            slow_query_ms: 1000.0,
            slow_query_critical_ms: 5000.0,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        // Expand environment variables
        let expanded = expand_env_vars(&content);

        let config: Config = toml::from_str(&expanded)
            .with_context(|| "Failed to parse configuration")?;

        Ok(config)
    }
}

/// Expand ${ENV_VAR} references in config string
fn expand_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .to_string()
}

// Default value functions
fn default_data_dir() -> PathBuf { PathBuf::from(".") }
fn default_log_level() -> String { "info".to_string() }
fn default_server_name() -> String { "payment-monitoring".to_string() }
fn default_75() -> f64 { 75.0 }
fn default_85() -> f64 { 85.0 }
fn default_90() -> f64 { 90.0 }
fn default_95() -> f64 { 95.0 }
fn default_1000() -> f64 { 1000.0 }
fn default_5000() -> f64 { 5000.0 }
fn default_error_limit() -> usize { 5 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_contract() {
        let t = ThresholdConfig::default();
        assert_eq!(t.metric_anomaly_percent, 85.0);
        assert_eq!(t.metric_critical_percent, 95.0);
        assert_eq!(t.usage_high_percent, 75.0);
        assert_eq!(t.usage_critical_percent, 90.0);
        assert_eq!(t.error_log_limit, 5);
        assert_eq!(t.slow_query_ms, 1000.0);
        assert_eq!(t.slow_query_critical_ms, 5000.0);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [agent]
            data_dir = "/var/lib/payment-monitor"

            [thresholds]
            slow_query_ms = 500.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.agent.data_dir, PathBuf::from("/var/lib/payment-monitor"));
        assert_eq!(cfg.agent.log_level, "info");
        assert_eq!(cfg.thresholds.slow_query_ms, 500.0);
        assert_eq!(cfg.thresholds.metric_anomaly_percent, 85.0);
    }

    #[test]
    fn env_vars_expanded() {
        std::env::set_var("PM_TEST_DIR", "/tmp/pm-data");
        let expanded = expand_env_vars("data_dir = \"${PM_TEST_DIR}\"");
        assert_eq!(expanded, "data_dir = \"/tmp/pm-data\"");
    }
}
