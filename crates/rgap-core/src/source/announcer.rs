//! Periodic sender of signed announcements.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use chrono::Utc;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::error::{CoreError, SourceError};
use crate::protocol::{Announcement, Psk};

/// Announces one address to one destination on a fixed interval.
pub struct Announcer {
    psk: Psk,
    address: IpAddr,
    destination: SocketAddr,
    interval: Duration,
    socket: UdpSocket,
}

impl Announcer {
    /// Bind an ephemeral socket matching the destination's address family.
    pub async fn bind(
        psk: Psk,
        address: IpAddr,
        destination: SocketAddr,
        interval: Duration,
    ) -> Result<Self, SourceError> {
        let local = match destination {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| SourceError::Bind {
                address: local.to_string(),
                source,
            })?;

        Ok(Self {
            psk,
            address,
            destination,
            interval,
            socket,
        })
    }

    /// Sign and send a single announcement stamped with the current time.
    pub async fn send_once(&self) -> Result<(), CoreError> {
        let announcement = Announcement::new(self.address, Utc::now(), &self.psk)?;
        self.socket
            .send_to(&announcement.encode(), self.destination)
            .await?;
        debug!(address = %self.address, destination = %self.destination, "sent announcement");
        Ok(())
    }

    /// Announce every interval until `shutdown` resolves. Send failures are
    /// logged and retried on the next tick.
    pub async fn run<S>(&self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.interval);
        info!(
            address = %self.address,
            destination = %self.destination,
            interval = ?self.interval,
            "announcing"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.send_once().await {
                        warn!(destination = %self.destination, error = %e, "announce failed");
                    }
                }
            }
        }
    }
}
