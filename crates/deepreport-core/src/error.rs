use std::path::PathBuf;

use thiserror::Error;

/// Core error type for DeepReport.
///
/// Only `Planning` and the configuration variants abort a research run; every
/// other failure class degrades in place and is surfaced through `tracing`.
#[derive(Debug, Error)]
pub enum DeepReportError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("missing environment variable: {0}")]
    MissingSecret(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("planning failed: {0}")]
    Planning(String),
    #[error("synthesis failed: {0}")]
    Synthesis(String),
    #[error("model invocation failed: {0}")]
    Llm(#[source] reqwest::Error),
    #[error("retrieval request failed: {0}")]
    Retrieval(#[source] reqwest::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeepReportError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }

    /// Transient connectivity failures are the only retryable class.
    /// Application-level parse failures never are.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Llm(source) | Self::Retrieval(source) => {
                source.is_connect() || source.is_timeout()
            }
            _ => false,
        }
    }
}
