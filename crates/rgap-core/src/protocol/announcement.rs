//! Fixed-size announcement codec and HMAC verification.
//!
//! Layout (57 bytes):
//!
//! ```text
//! version(1) | timestamp_micros(8, i64 BE) | address(16) | hmac_sha256(32)
//! ```
//!
//! The MAC covers the first 25 bytes. IPv4 addresses travel in their
//! IPv4-mapped IPv6 form.

use std::net::{IpAddr, Ipv6Addr};

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::psk::Psk;
use crate::error::{ProtocolError, VerifyError};

type HmacSha256 = Hmac<Sha256>;

/// Current wire version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Size of one encoded announcement in bytes.
pub const ANNOUNCEMENT_SIZE: usize = 57;

const SIGNED_LEN: usize = 25;
const SIGNATURE_LEN: usize = 32;

/// One decoded presence announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    version: u8,
    timestamp: DateTime<Utc>,
    address: Ipv6Addr,
    signature: [u8; SIGNATURE_LEN],
}

impl Announcement {
    /// Build and sign an announcement for `address` as of `timestamp`.
    ///
    /// The timestamp is truncated to microsecond precision.
    pub fn new(address: IpAddr, timestamp: DateTime<Utc>, psk: &Psk) -> Result<Self, VerifyError> {
        let micros = timestamp.timestamp_micros();
        let timestamp = DateTime::from_timestamp_micros(micros).unwrap_or(timestamp);
        let mut announcement = Self {
            version: PROTOCOL_VERSION,
            timestamp,
            address: to_wire_address(address),
            signature: [0u8; SIGNATURE_LEN],
        };
        let mac = keyed_mac(psk, &announcement.signed_bytes())?;
        announcement
            .signature
            .copy_from_slice(&mac.finalize().into_bytes());
        Ok(announcement)
    }

    /// Decode one datagram.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() != ANNOUNCEMENT_SIZE {
            return Err(ProtocolError::MalformedMessage(format!(
                "expected {} bytes, got {}",
                ANNOUNCEMENT_SIZE,
                data.len()
            )));
        }

        let version = data[0];
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::MalformedMessage(format!(
                "unsupported version {}",
                version
            )));
        }

        let mut micros = [0u8; 8];
        micros.copy_from_slice(&data[1..9]);
        let micros = i64::from_be_bytes(micros);
        let timestamp = DateTime::from_timestamp_micros(micros).ok_or_else(|| {
            ProtocolError::MalformedMessage(format!("timestamp {} out of range", micros))
        })?;

        let mut address = [0u8; 16];
        address.copy_from_slice(&data[9..SIGNED_LEN]);

        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&data[SIGNED_LEN..]);

        Ok(Self {
            version,
            timestamp,
            address: Ipv6Addr::from(address),
            signature,
        })
    }

    /// Encode to the 57-byte wire form.
    pub fn encode(&self) -> [u8; ANNOUNCEMENT_SIZE] {
        let mut out = [0u8; ANNOUNCEMENT_SIZE];
        out[..SIGNED_LEN].copy_from_slice(&self.signed_bytes());
        out[SIGNED_LEN..].copy_from_slice(&self.signature);
        out
    }

    /// Verify the signature under `psk`.
    ///
    /// A mismatch is `Ok(false)`. `Err` means the MAC could not be computed
    /// at all.
    pub fn check_signature(&self, psk: &Psk) -> Result<bool, VerifyError> {
        let mac = keyed_mac(psk, &self.signed_bytes())?;
        Ok(mac.verify_slice(&self.signature).is_ok())
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Announced address, with IPv4-mapped addresses unwrapped to IPv4.
    pub fn address(&self) -> IpAddr {
        self.address.to_canonical()
    }

    pub fn signature(&self) -> &[u8; SIGNATURE_LEN] {
        &self.signature
    }

    fn signed_bytes(&self) -> [u8; SIGNED_LEN] {
        let mut out = [0u8; SIGNED_LEN];
        out[0] = self.version;
        out[1..9].copy_from_slice(&self.timestamp.timestamp_micros().to_be_bytes());
        out[9..].copy_from_slice(&self.address.octets());
        out
    }
}

fn keyed_mac(psk: &Psk, signed: &[u8]) -> Result<HmacSha256, VerifyError> {
    let mut mac = HmacSha256::new_from_slice(psk.as_bytes())
        .map_err(|e| VerifyError::InvalidKey(e.to_string()))?;
    mac.update(signed);
    Ok(mac)
}

fn to_wire_address(address: IpAddr) -> Ipv6Addr {
    match address {
        IpAddr::V4(v4) => v4.to_ipv6_mapped(),
        IpAddr::V6(v6) => v6,
    }
}
