// crates/mtp-sim/src/error.rs

use crate::identity::CanonicalKey;
use std::fmt;
use std::io;

/// Top-level error type for the simulator core.
#[derive(Debug)]
pub enum SimError {
    /// The override store could not persist or read a value.
    Store(StoreError),
    /// A sink refused or failed to deliver a value.
    Sink(SinkError),
    /// A node tree violates a structural invariant and cannot be loaded.
    InvalidTree(&'static str),
    /// The simulation configuration could not be read or written.
    Config(ConfigError),
}

/// Failure of the durable override store (`StorePersistenceFailure`).
#[derive(Debug)]
pub enum StoreError {
    /// An error from the underlying SQLite connection.
    Sqlite(rusqlite::Error),
    /// A thread panicked while holding the store lock.
    Poisoned,
}

/// Failure while delivering a value change to a sink (`SinkDeliveryFailure`).
///
/// These are logged by the fan-out and never propagated to the emitting tick or write.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkError {
    /// The sink has no variable for the given key.
    UnknownKey(CanonicalKey),
    /// The receiving side of a channel sink is gone.
    Disconnected,
    /// A bounded channel sink is full; the change was dropped.
    Full,
    /// The sink rejected the value for a sink-specific reason.
    Rejected(String),
    /// The sink panicked while handling the change.
    Panicked(String),
}

/// Failure while loading or saving the simulation configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "Value store error: {e}"),
            Self::Sink(e) => write!(f, "Sink error: {e}"),
            Self::InvalidTree(msg) => write!(f, "Invalid node tree: {msg}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "SQLite error: {e}"),
            Self::Poisoned => write!(f, "store lock poisoned by a panicking writer"),
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey(key) => write!(f, "no variable registered for '{key}'"),
            Self::Disconnected => write!(f, "sink receiver disconnected"),
            Self::Full => write!(f, "sink queue is full"),
            Self::Rejected(msg) => write!(f, "value rejected: {msg}"),
            Self::Panicked(msg) => write!(f, "sink panicked: {msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Sink(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::InvalidTree(_) => None,
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            Self::Poisoned => None,
        }
    }
}

impl std::error::Error for SinkError {}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
        }
    }
}

// --- From Implementations for Error Conversion ---

impl From<StoreError> for SimError {
    fn from(e: StoreError) -> Self {
        SimError::Store(e)
    }
}

impl From<SinkError> for SimError {
    fn from(e: SinkError) -> Self {
        SimError::Sink(e)
    }
}

impl From<ConfigError> for SimError {
    fn from(e: ConfigError) -> Self {
        SimError::Config(e)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_store_error() {
        let err: SimError = StoreError::Poisoned.into();
        assert!(matches!(err, SimError::Store(StoreError::Poisoned)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: ConfigError = json_err.into();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_sink_error_display_names_key() {
        let key = CanonicalKey::from_raw("R0001");
        let msg = SinkError::UnknownKey(key).to_string();
        assert!(msg.contains("ns=2;s=R0001"), "unexpected message: {msg}");
    }
}
