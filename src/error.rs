use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the analysis engine and the data store.
///
/// The engine never swallows one of these to hand back a partially-filled
/// report. An empty-but-present data category is not an error; it surfaces
/// as an absent summary instead (see `metrics::summarize`).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("data file {file} not found in {dir}")]
    DataNotFound { file: String, dir: PathBuf },

    #[error("failed to parse {file}: {reason}")]
    DataCorrupt { file: String, reason: String },

    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid date parameter: {0}")]
    InvalidParameter(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("failed to encode response: {0}")]
    Encode(String),
}
