//! UDP announcement source.
//!
//! One socket, one receive task. Each well-sized datagram is decoded and
//! handed to the injected callback inline, so callbacks must stay cheap.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{ConfigError, SourceError};
use crate::protocol::{Announcement, ANNOUNCEMENT_SIZE};

/// Receive buffer size; anything larger than an announcement is discarded
/// by length anyway.
const RECV_BUFFER_SIZE: usize = 4096;

/// Receives `(source label, announcement)` for every decoded datagram.
pub type AnnouncementCallback = Arc<dyn Fn(&str, &Announcement) + Send + Sync>;

struct Running {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// A UDP listener tagged with a routing label.
pub struct UdpSource {
    address: String,
    label: String,
    callback: AnnouncementCallback,
    running: Option<Running>,
}

impl UdpSource {
    /// Create a stopped source. Nothing is bound until `start()`.
    pub fn new<F>(address: impl Into<String>, label: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&str, &Announcement) + Send + Sync + 'static,
    {
        Self {
            address: address.into(),
            label: label.into(),
            callback: Arc::new(callback),
            running: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Bound address while running. Useful after binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Bind the socket and launch the receive loop.
    ///
    /// The address must be a literal `ip:port`; hostnames are not resolved.
    /// Multicast addresses are joined on the wildcard interface instead of
    /// being bound directly. Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> Result<(), SourceError> {
        if self.running.is_some() {
            return Err(SourceError::AlreadyRunning(self.label.clone()));
        }

        let addr = resolve(&self.address)?;
        let std_socket = create_listen_socket(addr).map_err(|source| SourceError::Bind {
            address: self.address.clone(),
            source,
        })?;
        let socket = UdpSocket::from_std(std_socket).map_err(|source| SourceError::Bind {
            address: self.address.clone(),
            source,
        })?;
        let local_addr = socket.local_addr().map_err(|source| SourceError::Bind {
            address: self.address.clone(),
            source,
        })?;

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(read_loop(
            socket,
            self.label.clone(),
            Arc::clone(&self.callback),
            shutdown_rx,
        ));

        self.running = Some(Running {
            shutdown,
            handle,
            local_addr,
        });
        info!(source = %self.label, address = %self.address, "started UDP source");
        Ok(())
    }

    /// Cancel the receive loop and wait until it has released the socket.
    ///
    /// A pending read is abandoned immediately; this never waits for traffic.
    pub async fn stop(&mut self) {
        let Some(Running {
            shutdown, handle, ..
        }) = self.running.take()
        else {
            return;
        };

        let _ = shutdown.send(());
        if let Err(e) = handle.await {
            warn!(source = %self.label, error = %e, "receive loop ended abnormally");
        }
        info!(source = %self.label, address = %self.address, "stopped UDP source");
    }
}

impl Drop for UdpSource {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(());
        }
    }
}

impl fmt::Debug for UdpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdpSource")
            .field("address", &self.address)
            .field("label", &self.label)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

fn resolve(address: &str) -> Result<SocketAddr, ConfigError> {
    address
        .parse()
        .map_err(|e: std::net::AddrParseError| ConfigError::InvalidListenAddress {
            address: address.to_string(),
            message: e.to_string(),
        })
}

/// Create a non-blocking UDP socket for `addr`, joining multicast groups.
///
/// Every socket sets address reuse so a unicast and a multicast source can
/// share one port.
pub fn create_listen_socket(addr: SocketAddr) -> Result<std::net::UdpSocket, std::io::Error> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    match addr.ip() {
        IpAddr::V4(group) if group.is_multicast() => {
            let any = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), addr.port());
            socket.bind(&any.into())?;
            socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
        }
        IpAddr::V6(group) if group.is_multicast() => {
            socket.set_only_v6(true)?;

            let any = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), addr.port());
            socket.bind(&any.into())?;
            socket.join_multicast_v6(&group, 0)?;
        }
        _ => socket.bind(&addr.into())?,
    }

    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

async fn read_loop(
    socket: UdpSocket,
    label: String,
    callback: AnnouncementCallback,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        let received = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            received = socket.recv_from(&mut buf) => received,
        };

        match received {
            Ok((len, peer)) => {
                if len != ANNOUNCEMENT_SIZE {
                    trace!(source = %label, %peer, len, "discarding datagram of wrong size");
                    continue;
                }
                match Announcement::decode(&buf[..len]) {
                    Ok(announcement) => callback(&label, &announcement),
                    Err(e) => {
                        warn!(source = %label, %peer, error = %e, "announcement decoding failed")
                    }
                }
            }
            Err(e) => {
                warn!(source = %label, error = %e, "UDP read error");
            }
        }
    }

    debug!(source = %label, "receive loop exited");
}
