//! Expiring address set backing a group.
//!
//! Entries live in a map keyed by address plus an expiry-ordered index, so
//! eviction only ever touches the entries that are actually due.

use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One present address and the instant its presence lapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub address: IpAddr,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub(crate) struct PresenceStore {
    entries: HashMap<IpAddr, DateTime<Utc>>,
    by_expiry: BTreeSet<(DateTime<Utc>, IpAddr)>,
}

impl PresenceStore {
    /// Record `expires_at` for `address` unless an equal or later expiry is
    /// already stored. Returns whether the store changed.
    pub fn upsert_if_later(&mut self, address: IpAddr, expires_at: DateTime<Utc>) -> bool {
        match self.entries.get(&address) {
            Some(current) if *current >= expires_at => false,
            Some(current) => {
                self.by_expiry.remove(&(*current, address));
                self.entries.insert(address, expires_at);
                self.by_expiry.insert((expires_at, address));
                true
            }
            None => {
                self.entries.insert(address, expires_at);
                self.by_expiry.insert((expires_at, address));
                true
            }
        }
    }

    pub fn expires_at(&self, address: &IpAddr) -> Option<DateTime<Utc>> {
        self.entries.get(address).copied()
    }

    /// Drop every entry with `expires_at <= now`. Returns how many went.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let mut evicted = 0;
        while let Some(&(expires_at, address)) = self.by_expiry.first() {
            if expires_at > now {
                break;
            }
            self.by_expiry.pop_first();
            self.entries.remove(&address);
            evicted += 1;
        }
        evicted
    }

    /// Entries still live at `now`, whether or not a sweep has run.
    pub fn live(&self, now: DateTime<Utc>) -> Vec<PresenceEntry> {
        self.entries
            .iter()
            .filter(|(_, expires_at)| **expires_at > now)
            .map(|(address, expires_at)| PresenceEntry {
                address: *address,
                expires_at: *expires_at,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_expiry.clear();
    }
}
