//! Last-known coil values.

use crate::source::{Address, CoilValue};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A coil value as last read from, or acknowledged by, the heat pump.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedValue {
    pub address: Address,
    pub value: CoilValue,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug)]
struct Entry {
    revision: u64,
    cached: CachedValue,
}

/// Per-address cache of coil values.
///
/// Every transport call takes a revision from [`CoilCache::next_revision`]
/// when it is issued. A result is only stored when its revision is newer than
/// the one already held, so an older read can never clobber a newer write.
/// Addresses that were never read successfully are simply absent.
#[derive(Debug, Default)]
pub struct CoilCache {
    entries: RwLock<HashMap<Address, Entry>>,
    revisions: AtomicU64,
}

impl CoilCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a revision for a transport call about to be issued.
    pub fn next_revision(&self) -> u64 {
        self.revisions.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store a value obtained by the call holding `revision`.
    ///
    /// Returns the stored entry, or `None` when a newer value was already
    /// present.
    pub fn store(&self, revision: u64, address: Address, value: CoilValue) -> Option<CachedValue> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&address)
            && existing.revision >= revision
        {
            return None;
        }
        let cached = CachedValue {
            address,
            value,
            last_updated: Utc::now(),
        };
        entries.insert(
            address,
            Entry {
                revision,
                cached: cached.clone(),
            },
        );
        Some(cached)
    }

    pub fn get(&self, address: Address) -> Option<CachedValue> {
        self.entries.read().get(&address).map(|e| e.cached.clone())
    }

    pub fn contains(&self, address: Address) -> bool {
        self.entries.read().contains_key(&address)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Copy of every cached value.
    pub fn snapshot(&self) -> HashMap<Address, CachedValue> {
        self.entries
            .read()
            .iter()
            .map(|(address, e)| (*address, e.cached.clone()))
            .collect()
    }
}
