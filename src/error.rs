//! Typed errors for the monitoring core.
//!
//! Each collaborator boundary has its own error type so callers can tell
//! bad upstream data apart from an unavailable service. None of these are
//! allowed to escape the public API as a panic.

use thiserror::Error;

/// A color value that cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ColorError {
    /// A channel was outside `0..=255` or not a finite number.
    #[error("invalid color: channel {channel} has value {value}")]
    OutOfRange { channel: &'static str, value: f64 },

    /// A CSS color string could not be parsed.
    #[error("invalid color: cannot parse '{0}'")]
    Unparseable(String),
}

/// The element snapshot provider could not deliver a snapshot.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("snapshot provider unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the persistent key-value store.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Stored content exists but cannot be read back.
    #[error("stored data under '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage operation on '{0}' timed out")]
    Timeout(String),
}

/// User-facing profile operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("profile not found: {0}")]
    NotFound(String),

    #[error("profile '{0}' is a preset and cannot be modified")]
    Immutable(String),

    #[error("invalid profile: {0}")]
    Invalid(String),

    #[error("maximum number of profiles ({0}) reached")]
    LimitReached(usize),

    #[error("profile import rejected: {0}")]
    InvalidImport(String),
}

/// Failures of requests sent through a scheduler handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The scheduler task is gone and can no longer answer.
    #[error("scheduler has stopped")]
    Stopped,

    #[error(transparent)]
    Profile(#[from] ProfileError),
}
