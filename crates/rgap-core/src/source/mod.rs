//! Network endpoints: the UDP ingestor and the periodic announcer.

pub mod announcer;
pub mod udp;

pub use announcer::Announcer;
pub use udp::{create_listen_socket, AnnouncementCallback, UdpSource};
