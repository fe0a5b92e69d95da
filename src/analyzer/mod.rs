pub mod anomaly;
pub mod health;

pub use anomaly::AnomalyDetector;
pub use health::HealthAnalyzer;
