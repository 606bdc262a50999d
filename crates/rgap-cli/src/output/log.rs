//! Sink that reports membership through the tracing log.

use rgap_core::PresenceEntry;
use tracing::info;

use super::{sorted, OutputSink};
use crate::error::CliError;

#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

impl OutputSink for LogSink {
    fn publish(&mut self, group: u64, entries: &[PresenceEntry]) -> Result<(), CliError> {
        let addresses: Vec<String> = sorted(entries)
            .iter()
            .map(|e| e.address.to_string())
            .collect();
        info!(group, count = addresses.len(), addresses = ?addresses, "group membership");
        Ok(())
    }
}
