//! Newline-delimited JSON sink.

use std::io::Write;

use chrono::Utc;
use rgap_core::PresenceEntry;
use serde_json::json;

use super::{sorted, OutputSink};
use crate::error::CliError;

/// Writes one JSON document per publish to `writer`.
pub struct JsonSink<W> {
    writer: W,
    pretty: bool,
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(writer: W, pretty: bool) -> Self {
        Self { writer, pretty }
    }

    /// Read options from the opaque output spec (`pretty: bool`).
    pub fn from_spec(spec: &serde_yaml::Value, writer: W) -> Self {
        let pretty = spec
            .get("pretty")
            .and_then(serde_yaml::Value::as_bool)
            .unwrap_or(false);
        Self::new(writer, pretty)
    }
}

impl<W: Write + Send> OutputSink for JsonSink<W> {
    fn publish(&mut self, group: u64, entries: &[PresenceEntry]) -> Result<(), CliError> {
        let output = json!({
            "group": group,
            "publishedAt": Utc::now(),
            "count": entries.len(),
            "entries": sorted(entries),
        });

        let text = if self.pretty {
            serde_json::to_string_pretty(&output)?
        } else {
            serde_json::to_string(&output)?
        };
        writeln!(self.writer, "{}", text)?;
        self.writer.flush()?;
        Ok(())
    }
}
