//! Error types for RGAP core.
//!
//! Protocol rejects (wrong length, stale timestamp, bad signature) are not
//! errors at the group level; they are dropped where they occur. Only the
//! kinds below ever cross an API boundary.

use thiserror::Error;

/// Core error type for shared operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Verification error: {0}")]
    Verify(#[from] VerifyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors. Fatal to the group or source being built, never to
/// its siblings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Group {group}: PSK is missing")]
    MissingPsk { group: u64 },

    #[error("Group {group}: expire must be positive")]
    NonPositiveExpire { group: u64 },

    #[error("Invalid listen address '{address}': {message}")]
    InvalidListenAddress { address: String, message: String },

    #[error("Invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("Invalid PSK: {0}")]
    InvalidPsk(String),

    #[error("Unknown output kind: {0}")]
    UnknownOutput(String),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// UDP source lifecycle errors.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("UDP listen on {address} failed: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Source {0} is already running")]
    AlreadyRunning(String),
}

/// Decode failures for a single datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

/// Internal failure of the signature primitive. A signature that simply does
/// not match is reported as `Ok(false)`, never as this error.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Unusable key material: {0}")]
    InvalidKey(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
