//! RGAP core: signed UDP group address presence.
//!
//! Members periodically announce "I am reachable at address A as of time T"
//! to a trust group, authenticated with the group's pre-shared key. This
//! crate provides the wire codec, the per-group presence store and the UDP
//! ingestion loop; composing them is left to the caller.

pub mod config;
pub mod error;
pub mod group;
pub mod protocol;
pub mod source;

pub use config::{GroupConfig, ListenerConfig, OutputConfig};
pub use error::{ConfigError, CoreError, ProtocolError, SourceError, VerifyError};
pub use group::{Group, IngestOutcome, PresenceEntry, Reject};
pub use protocol::{Announcement, Psk, ANNOUNCEMENT_SIZE, PROTOCOL_VERSION};
pub use source::{Announcer, UdpSource};
