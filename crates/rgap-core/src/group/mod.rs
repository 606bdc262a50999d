//! Per-group presence tracking.
//!
//! A [`Group`] authenticates announcements with its PSK and keeps the set of
//! addresses whose presence has not yet lapsed. A background sweeper evicts
//! lapsed entries; `list()` filters them as well so readers never see an
//! expired address between sweeps.

pub mod clock;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::config::GroupConfig;
use crate::error::{ConfigError, VerifyError};
use crate::protocol::{Announcement, Psk, PROTOCOL_VERSION};

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::PresenceEntry;

use store::PresenceStore;

/// How often the sweeper evicts lapsed entries
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Why a well-formed announcement was not taken into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reject {
    Version,
    ClockSkew,
    Signature,
    /// Authentic, but its presence window has already closed.
    Expired,
}

/// Result of a successful `ingest` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The address was added or its expiry was extended.
    Accepted,
    /// Authentic, but the stored expiry is already equal or later.
    Unchanged,
    Rejected(Reject),
}

struct Sweeper {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Presence store for one trust group.
pub struct Group {
    id: u64,
    psk: Psk,
    expire: TimeDelta,
    clock_skew: TimeDelta,
    readiness_delay: TimeDelta,
    clock: Arc<dyn Clock>,
    store: Arc<RwLock<PresenceStore>>,
    ready_at: RwLock<Option<DateTime<Utc>>>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl Group {
    /// Build a group using the system clock.
    pub fn from_config(config: &GroupConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a group reading time from `clock`.
    pub fn with_clock(config: &GroupConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let psk = config
            .psk
            .clone()
            .ok_or(ConfigError::MissingPsk { group: config.id })?;

        if config.expire.is_zero() {
            return Err(ConfigError::NonPositiveExpire { group: config.id });
        }

        let expire = to_delta(config.expire)?;
        let clock_skew = if config.clock_skew.is_zero() || config.clock_skew > config.expire {
            expire
        } else {
            to_delta(config.clock_skew)?
        };
        let readiness_delay = to_delta(config.readiness_delay)?;
        if clock.now().checked_add_signed(readiness_delay).is_none() {
            return Err(ConfigError::InvalidDuration(crate::config::format_duration(
                config.readiness_delay,
            )));
        }

        Ok(Self {
            id: config.id,
            psk,
            expire,
            clock_skew,
            readiness_delay,
            clock,
            store: Arc::new(RwLock::new(PresenceStore::default())),
            ready_at: RwLock::new(None),
            sweeper: Mutex::new(None),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn expire(&self) -> TimeDelta {
        self.expire
    }

    /// Effective clock skew after normalization against `expire`.
    pub fn clock_skew(&self) -> TimeDelta {
        self.clock_skew
    }

    /// Launch the sweeper and open the readiness window.
    ///
    /// Must be called from within a Tokio runtime. Calling it on a running
    /// group only restarts the readiness window.
    pub fn start(&self) {
        let ready_at = self
            .clock
            .now()
            .checked_add_signed(self.readiness_delay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        *self.ready_at.write() = Some(ready_at);

        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            debug!(group = self.id, "group already started");
            return;
        }

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(sweep_loop(
            self.id,
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            shutdown_rx,
        ));
        *sweeper = Some(Sweeper { shutdown, handle });
        info!(group = self.id, "started group");
    }

    /// Stop the sweeper, wait for it to exit and discard all entries.
    pub async fn stop(&self) {
        let sweeper = self.sweeper.lock().take();
        if let Some(Sweeper { shutdown, handle }) = sweeper {
            let _ = shutdown.send(());
            let _ = handle.await;
        }
        self.store.write().clear();
        *self.ready_at.write() = None;
        info!(group = self.id, "stopped group");
    }

    /// Offer one announcement to the group.
    ///
    /// Version, clock-skew and signature rejects are normal outcomes. Only a
    /// failure of the MAC primitive itself is an error.
    pub fn ingest(&self, announcement: &Announcement) -> Result<IngestOutcome, VerifyError> {
        if announcement.version() != PROTOCOL_VERSION {
            trace!(group = self.id, version = announcement.version(), "version mismatch");
            return Ok(IngestOutcome::Rejected(Reject::Version));
        }

        let now = self.clock.now();
        let timestamp = announcement.timestamp();
        if (now - timestamp).abs() > self.clock_skew {
            trace!(group = self.id, %timestamp, "announcement outside clock skew");
            return Ok(IngestOutcome::Rejected(Reject::ClockSkew));
        }

        if !announcement.check_signature(&self.psk)? {
            trace!(group = self.id, "signature mismatch");
            return Ok(IngestOutcome::Rejected(Reject::Signature));
        }

        let expires_at = match timestamp.checked_add_signed(self.expire) {
            Some(at) if at > now => at,
            _ => return Ok(IngestOutcome::Rejected(Reject::Expired)),
        };

        let address = announcement.address();
        if self.store.write().upsert_if_later(address, expires_at) {
            debug!(group = self.id, %address, %expires_at, "presence extended");
            Ok(IngestOutcome::Accepted)
        } else {
            Ok(IngestOutcome::Unchanged)
        }
    }

    /// Snapshot of currently present addresses, in no particular order.
    pub fn list(&self) -> Vec<PresenceEntry> {
        let now = self.clock.now();
        self.store.read().live(now)
    }

    /// Whether the readiness delay has passed since `start()`.
    pub fn ready(&self) -> bool {
        match *self.ready_at.read() {
            Some(ready_at) => self.clock.now() > ready_at,
            None => false,
        }
    }

    /// Run one eviction pass immediately. Returns how many entries went.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        self.store.write().evict_expired(now)
    }

    /// Stored entries, including lapsed ones not yet swept.
    pub fn stored_len(&self) -> usize {
        self.store.read().len()
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.id)
            .field("expire", &self.expire)
            .field("clock_skew", &self.clock_skew)
            .field("readiness_delay", &self.readiness_delay)
            .finish_non_exhaustive()
    }
}

async fn sweep_loop(
    group: u64,
    store: Arc<RwLock<PresenceStore>>,
    clock: Arc<dyn Clock>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let evicted = store.write().evict_expired(clock.now());
                if evicted > 0 {
                    debug!(group, evicted, "evicted expired entries");
                }
            }
        }
    }
}

fn to_delta(duration: Duration) -> Result<TimeDelta, ConfigError> {
    TimeDelta::from_std(duration)
        .map_err(|_| ConfigError::InvalidDuration(crate::config::format_duration(duration)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn key() -> Psk {
        Psk::new(b"group-one-key".to_vec()).unwrap()
    }

    fn config(expire: u64, skew: u64) -> GroupConfig {
        GroupConfig {
            id: 1,
            psk: Some(key()),
            expire: Duration::from_secs(expire),
            clock_skew: Duration::from_secs(skew),
            readiness_delay: Duration::ZERO,
        }
    }

    // Microsecond-aligned so wire truncation never shifts test timestamps.
    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp_micros(1_700_000_000_000_000).unwrap()
    }

    fn group(expire: u64, skew: u64) -> (Group, ManualClock) {
        let clock = ManualClock::new(epoch());
        let group = Group::with_clock(&config(expire, skew), Arc::new(clock.clone())).unwrap();
        (group, clock)
    }

    fn announce(address: IpAddr, at: DateTime<Utc>) -> Announcement {
        Announcement::new(address, at, &key()).unwrap()
    }

    const A: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));

    #[test]
    fn test_config_validation() {
        let mut cfg = config(10, 0);
        cfg.psk = None;
        assert!(matches!(
            Group::from_config(&cfg),
            Err(ConfigError::MissingPsk { group: 1 })
        ));

        let cfg = config(0, 0);
        assert!(matches!(
            Group::from_config(&cfg),
            Err(ConfigError::NonPositiveExpire { group: 1 })
        ));
    }

    #[test]
    fn test_readiness_delay_past_calendar_range_rejected() {
        let mut cfg = config(10, 0);
        cfg.readiness_delay = Duration::from_secs(3_000_000_000 * 3600);
        assert!(matches!(
            Group::from_config(&cfg),
            Err(ConfigError::InvalidDuration(_))
        ));
    }

    #[tokio::test]
    async fn test_start_near_calendar_end_never_becomes_ready() {
        let clock = ManualClock::new(epoch());
        let mut cfg = config(10, 0);
        cfg.readiness_delay = Duration::from_secs(3600);
        let group = Group::with_clock(&cfg, Arc::new(clock.clone())).unwrap();

        clock.set(DateTime::<Utc>::MAX_UTC - TimeDelta::seconds(1));
        group.start();
        assert!(!group.ready());
        group.stop().await;
    }

    #[test]
    fn test_clock_skew_normalization() {
        let (defaulted, _) = group(10, 0);
        assert_eq!(defaulted.clock_skew(), TimeDelta::seconds(10));

        let (clamped, _) = group(10, 60);
        assert_eq!(clamped.clock_skew(), TimeDelta::seconds(10));

        let (kept, _) = group(10, 3);
        assert_eq!(kept.clock_skew(), TimeDelta::seconds(3));
    }

    #[test]
    fn test_clock_skew_boundaries_past_and_future() {
        let (group, clock) = group(60, 5);
        let now = clock.now();
        let skew = TimeDelta::seconds(5);
        let us = TimeDelta::microseconds(1);

        let reject = IngestOutcome::Rejected(Reject::ClockSkew);
        assert_eq!(group.ingest(&announce(A, now - skew - us)).unwrap(), reject);
        assert_eq!(group.ingest(&announce(A, now + skew + us)).unwrap(), reject);

        assert_eq!(
            group.ingest(&announce(A, now - skew + us)).unwrap(),
            IngestOutcome::Accepted
        );
        assert_eq!(
            group.ingest(&announce(A, now + skew - us)).unwrap(),
            IngestOutcome::Accepted
        );
    }

    #[test]
    fn test_clock_skew_bound_is_inclusive() {
        let (group, clock) = group(60, 5);
        let now = clock.now();
        let skew = TimeDelta::seconds(5);

        assert_eq!(
            group.ingest(&announce(A, now - skew)).unwrap(),
            IngestOutcome::Accepted
        );
        let b = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 2));
        assert_eq!(
            group.ingest(&announce(b, now + skew)).unwrap(),
            IngestOutcome::Accepted
        );
    }

    #[test]
    fn test_ratchet_keeps_latest_expiry_in_either_order() {
        let (group, clock) = group(30, 0);
        let now = clock.now();
        let older = announce(A, now - TimeDelta::seconds(5));
        let newer = announce(A, now);

        assert_eq!(group.ingest(&older).unwrap(), IngestOutcome::Accepted);
        assert_eq!(group.ingest(&newer).unwrap(), IngestOutcome::Accepted);
        assert_eq!(group.list()[0].expires_at, newer.timestamp() + TimeDelta::seconds(30));

        let (group, _) = group_at(now);
        assert_eq!(group.ingest(&newer).unwrap(), IngestOutcome::Accepted);
        assert_eq!(group.ingest(&older).unwrap(), IngestOutcome::Unchanged);
        assert_eq!(group.list()[0].expires_at, newer.timestamp() + TimeDelta::seconds(30));
    }

    fn group_at(now: DateTime<Utc>) -> (Group, ManualClock) {
        let clock = ManualClock::new(now);
        let group = Group::with_clock(&config(30, 0), Arc::new(clock.clone())).unwrap();
        (group, clock)
    }

    #[test]
    fn test_duplicate_is_unchanged() {
        let (group, clock) = group(30, 0);
        let ann = announce(A, clock.now());
        assert_eq!(group.ingest(&ann).unwrap(), IngestOutcome::Accepted);
        assert_eq!(group.ingest(&ann).unwrap(), IngestOutcome::Unchanged);
        assert_eq!(group.list().len(), 1);
    }

    #[test]
    fn test_signature_and_key_mismatch_rejected() {
        let (group, clock) = group(30, 0);
        let other = Psk::new(b"someone else".to_vec()).unwrap();
        let forged = Announcement::new(A, clock.now(), &other).unwrap();

        assert_eq!(
            group.ingest(&forged).unwrap(),
            IngestOutcome::Rejected(Reject::Signature)
        );
        assert!(group.list().is_empty());
    }

    #[test]
    fn test_window_closed_at_skew_equal_to_expire() {
        let (group, clock) = group(10, 0);
        let ann = announce(A, clock.now() - TimeDelta::seconds(10));
        assert_eq!(
            group.ingest(&ann).unwrap(),
            IngestOutcome::Rejected(Reject::Expired)
        );
        assert_eq!(group.stored_len(), 0);
    }

    #[test]
    fn test_expiry_scenario() {
        let (group, clock) = group(10, 0);
        let now = clock.now();
        group.ingest(&announce(A, now)).unwrap();

        let listed = group.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].address, A);
        assert_eq!(listed[0].expires_at, announce(A, now).timestamp() + TimeDelta::seconds(10));

        clock.advance(TimeDelta::seconds(11));
        assert!(group.list().is_empty());
        assert_eq!(group.stored_len(), 1);
        assert_eq!(group.sweep(), 1);
        assert_eq!(group.stored_len(), 0);
    }

    #[test]
    fn test_list_hides_entry_at_exact_expiry() {
        let (group, clock) = group(10, 0);
        let ann = announce(A, clock.now());
        group.ingest(&ann).unwrap();

        clock.set(ann.timestamp() + TimeDelta::seconds(10));
        assert!(group.list().is_empty());
    }

    #[test]
    fn test_not_ready_before_start() {
        let (group, _) = group(10, 0);
        assert!(!group.ready());
    }

    #[tokio::test]
    async fn test_readiness_delay() {
        let clock = ManualClock::new(epoch());
        let mut cfg = config(10, 0);
        cfg.readiness_delay = Duration::from_secs(5);
        let group = Group::with_clock(&cfg, Arc::new(clock.clone())).unwrap();

        group.start();
        assert!(!group.ready());

        for _ in 0..100 {
            group.ingest(&announce(A, clock.now())).unwrap();
        }
        clock.advance(TimeDelta::seconds(4));
        assert!(!group.ready());

        clock.advance(TimeDelta::seconds(1) + TimeDelta::microseconds(1));
        assert!(group.ready());

        group.stop().await;
        assert!(!group.ready());
    }

    #[tokio::test]
    async fn test_stop_discards_entries() {
        let (group, clock) = group(10, 0);
        group.start();
        group.ingest(&announce(A, clock.now())).unwrap();
        assert_eq!(group.list().len(), 1);

        group.stop().await;
        assert!(group.list().is_empty());
        assert_eq!(group.stored_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_in_background() {
        let (group, clock) = group(10, 0);
        group.start();
        group.ingest(&announce(A, clock.now())).unwrap();

        clock.advance(TimeDelta::seconds(11));
        tokio::time::sleep(SWEEP_INTERVAL * 2).await;
        assert_eq!(group.stored_len(), 0);

        group.stop().await;
    }
}
