//! Wire protocol: announcement codec, signing and verification.

pub mod announcement;
pub mod psk;

pub use announcement::{Announcement, ANNOUNCEMENT_SIZE, PROTOCOL_VERSION};
pub use psk::{Psk, DEFAULT_PSK_LEN};
