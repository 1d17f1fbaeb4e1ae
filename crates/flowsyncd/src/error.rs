//! Error types for flowsyncd.

use thiserror::Error;

/// Daemon-level failures: configuration and startup. Reconciliation
/// failures never reach this type; they are absorbed by the engine
/// and surfaced through rule status.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
