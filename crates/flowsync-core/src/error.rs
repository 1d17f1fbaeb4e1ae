//! Error taxonomy for the synchronization core.
//!
//! Transient transport failures are retried inside the reconciliation
//! engine and never bubble past it; conflict and install-failure
//! outcomes travel through rule status, not the call stack. The types
//! here cover what remains: hard per-call failures and the seams.

use flowsync_types::DatapathId;
use thiserror::Error;
use uuid::Uuid;

/// Failure from the switch transport.
///
/// Both variants are transient from the engine's point of view and are
/// retried with backoff up to the configured attempt budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No reply within the transport's deadline.
    #[error("transport timeout")]
    Timeout,

    /// The control session dropped or refused the message.
    #[error("transport error: {0}")]
    Connection(String),
}

/// Failure from the rule store adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No rule with the given id.
    #[error("unknown rule: {0}")]
    UnknownRule(Uuid),

    /// Backend failure (connection, serialization, ...).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Top-level core error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Operation targeted a switch the registry has never seen.
    /// Fatal to the call only, never to the engine.
    #[error("unknown switch: {0}")]
    UnknownSwitch(DatapathId),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Rule failed validation before reaching the store.
    #[error("invalid rule: {0}")]
    InvalidRule(#[from] flowsync_types::ParseError),
}

/// Result alias used across the core.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::UnknownSwitch(DatapathId::new(7));
        assert_eq!(err.to_string(), "unknown switch: 00:00:00:00:00:00:00:07");
    }

    #[test]
    fn test_transport_error_conversion() {
        let err: CoreError = TransportError::Timeout.into();
        assert!(matches!(err, CoreError::Transport(TransportError::Timeout)));
    }
}
