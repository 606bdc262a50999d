//! Error types for the RGAP CLI.
//!
//! CliError wraps CoreError from the shared library and adds CLI-specific variants.

use rgap_core::error::CoreError;
use thiserror::Error;

pub use rgap_core::error::{ConfigError, SourceError, VerifyError};

/// Exit codes for the CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NETWORK_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const INVALID_ARGS: i32 = 4;
}

/// Main error type for the CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Core(e) => match e {
                CoreError::Config(_) => exit_codes::CONFIG_ERROR,
                CoreError::Source(SourceError::Config(_)) => exit_codes::CONFIG_ERROR,
                CoreError::Source(_) => exit_codes::NETWORK_ERROR,
                CoreError::Io(_) => exit_codes::NETWORK_ERROR,
                CoreError::Protocol(_) => exit_codes::GENERAL_ERROR,
                CoreError::Verify(_) => exit_codes::GENERAL_ERROR,
            },
            CliError::Io(_) => exit_codes::GENERAL_ERROR,
            CliError::InvalidArgument(_) => exit_codes::INVALID_ARGS,
            CliError::Output(_) => exit_codes::GENERAL_ERROR,
            CliError::Other(_) => exit_codes::GENERAL_ERROR,
        }
    }
}

// Conversions from core error subtypes to CliError
impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Core(CoreError::Config(e))
    }
}

impl From<SourceError> for CliError {
    fn from(e: SourceError) -> Self {
        CliError::Core(CoreError::Source(e))
    }
}

impl From<VerifyError> for CliError {
    fn from(e: VerifyError) -> Self {
        CliError::Core(CoreError::Verify(e))
    }
}
