//! CLI argument definitions using clap.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use rgap_core::config::parse_duration;
use rgap_core::protocol::{Psk, DEFAULT_PSK_LEN};

/// RGAP - signed group address presence over UDP
#[derive(Parser, Debug)]
#[command(name = "rgap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose output (debug logging unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Listen for announcements and publish group membership
    Listen(ListenArgs),

    /// Periodically announce an address to a group
    Announce(AnnounceArgs),

    /// Generate a random pre-shared key
    Genpsk(GenpskArgs),
}

// ==================== Listen ====================

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// YAML configuration file
    #[arg(short, long, env = "RGAP_CONFIG")]
    pub config: PathBuf,

    /// How often ready groups are published to outputs
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub interval: Duration,
}

// ==================== Announce ====================

#[derive(Args, Debug)]
pub struct AnnounceArgs {
    /// Group pre-shared key (base64)
    #[arg(long, env = "RGAP_PSK", hide_env_values = true)]
    pub psk: Psk,

    /// Address to announce
    #[arg(short, long)]
    pub address: IpAddr,

    /// Destination, unicast or multicast (e.g. 239.0.0.1:8765)
    #[arg(short, long)]
    pub to: SocketAddr,

    /// Time between announcements
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    pub interval: Duration,

    /// Send a single announcement and exit
    #[arg(long)]
    pub once: bool,
}

// ==================== Genpsk ====================

#[derive(Args, Debug)]
pub struct GenpskArgs {
    /// Key length in bytes
    #[arg(long, default_value_t = DEFAULT_PSK_LEN)]
    pub bytes: usize,
}
