//! Listener configuration shape and YAML loading.
//!
//! The core only interprets `groups` and `listen`. Output descriptors are
//! carried as `{kind, spec}` with `spec` left as an opaque YAML document for
//! whatever wires outputs up.

pub mod duration;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::protocol::Psk;

pub use duration::{format_duration, parse_duration};

/// Settings for one trust group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub id: u64,

    #[serde(default)]
    pub psk: Option<Psk>,

    /// Lifetime of an accepted announcement, measured from its timestamp.
    #[serde(with = "duration")]
    pub expire: Duration,

    /// Zero means "same as `expire`".
    #[serde(default, with = "duration")]
    pub clock_skew: Duration,

    #[serde(default, with = "duration")]
    pub readiness_delay: Duration,
}

/// Output sink descriptor, never interpreted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub kind: String,

    #[serde(default)]
    pub spec: serde_yaml::Value,
}

/// Top-level listener configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default)]
    pub listen: Vec<String>,

    #[serde(default)]
    pub groups: Vec<GroupConfig>,

    #[serde(default)]
    pub outputs: Vec<OutputConfig>,
}

impl ListenerConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read and parse a YAML configuration file.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::ReadFile {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
listen:
  - "0.0.0.0:8765"
  - "239.0.0.1:8765"
groups:
  - id: 1
    psk: "c2l4dGVlbiBieXRlIGtleQ=="
    expire: 30s
    clock_skew: 10s
    readiness_delay: 1m
  - id: 2
    psk: "b3RoZXI="
    expire: 45
outputs:
  - kind: log
  - kind: json
    spec:
      pretty: true
"#;

    #[test]
    fn test_parse_sample() {
        let cfg = ListenerConfig::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(cfg.listen, vec!["0.0.0.0:8765", "239.0.0.1:8765"]);
        assert_eq!(cfg.groups.len(), 2);

        let g1 = &cfg.groups[0];
        assert_eq!(g1.id, 1);
        assert_eq!(g1.psk.as_ref().unwrap().as_bytes(), b"sixteen byte key");
        assert_eq!(g1.expire, Duration::from_secs(30));
        assert_eq!(g1.clock_skew, Duration::from_secs(10));
        assert_eq!(g1.readiness_delay, Duration::from_secs(60));

        let g2 = &cfg.groups[1];
        assert_eq!(g2.expire, Duration::from_secs(45));
        assert_eq!(g2.clock_skew, Duration::ZERO);
        assert_eq!(g2.readiness_delay, Duration::ZERO);

        assert_eq!(cfg.outputs[0].kind, "log");
        assert!(cfg.outputs[0].spec.is_null());
        assert_eq!(cfg.outputs[1].spec["pretty"], serde_yaml::Value::Bool(true));
    }

    #[test]
    fn test_missing_psk_parses_as_none() {
        let cfg = ListenerConfig::from_yaml_str("groups:\n  - id: 3\n    expire: 5s\n").unwrap();
        assert!(cfg.groups[0].psk.is_none());
    }

    #[test]
    fn test_bad_values_rejected() {
        let bad_duration = "groups:\n  - id: 1\n    psk: \"a2V5\"\n    expire: soon\n";
        assert!(matches!(
            ListenerConfig::from_yaml_str(bad_duration),
            Err(ConfigError::ParseError(_))
        ));

        let bad_psk = "groups:\n  - id: 1\n    psk: \"***\"\n    expire: 5s\n";
        assert!(ListenerConfig::from_yaml_str(bad_psk).is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let cfg = ListenerConfig::from_yaml_str(SAMPLE).unwrap();
        let text = cfg.to_yaml_string().unwrap();
        assert_eq!(ListenerConfig::from_yaml_str(&text).unwrap(), cfg);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let cfg = ListenerConfig::load(file.path()).await.unwrap();
        assert_eq!(cfg.groups.len(), 2);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = ListenerConfig::load(Path::new("/nonexistent/rgap.yaml")).await;
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
