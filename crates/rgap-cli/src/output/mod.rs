//! Output sinks for published group membership.
//!
//! Sinks receive a group's live entries each publish tick once the group is
//! ready. Firewall or router integrations would plug in here as further
//! kinds.

pub mod json;
pub mod log;

pub use json::JsonSink;
pub use log::LogSink;

use rgap_core::{ConfigError, OutputConfig, PresenceEntry};

use crate::error::CliError;

/// Destination for a group's address set
pub trait OutputSink: Send {
    /// Publish the current entries for `group`
    fn publish(&mut self, group: u64, entries: &[PresenceEntry]) -> Result<(), CliError>;
}

/// Build the sink named by `config.kind`
pub fn build_sink(config: &OutputConfig) -> Result<Box<dyn OutputSink>, ConfigError> {
    match config.kind.as_str() {
        "log" => Ok(Box::new(LogSink::new())),
        "json" => Ok(Box::new(JsonSink::from_spec(&config.spec, std::io::stdout()))),
        other => Err(ConfigError::UnknownOutput(other.to_string())),
    }
}

/// Entries ordered by address for stable output
pub(crate) fn sorted(entries: &[PresenceEntry]) -> Vec<PresenceEntry> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| a.address.cmp(&b.address));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(kind: &str) -> OutputConfig {
        OutputConfig {
            kind: kind.to_string(),
            spec: serde_yaml::Value::Null,
        }
    }

    #[test]
    fn test_known_kinds_build() {
        assert!(build_sink(&output("log")).is_ok());
        assert!(build_sink(&output("json")).is_ok());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(matches!(
            build_sink(&output("nftables")),
            Err(ConfigError::UnknownOutput(kind)) if kind == "nftables"
        ));
    }
}
