//! Listener registry and the address → listener index built from it.

use crate::source::Address;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Callback invoked when data a listener watches was refreshed.
///
/// Takes no arguments: listeners pull fresh values from the cache.
pub type UpdateCallback = Arc<dyn Fn() + Send + Sync>;

/// Opaque identity of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(Uuid);

impl ListenerHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A listener as captured at the start of a refresh cycle.
#[derive(Clone)]
pub struct RegisteredListener {
    pub handle: ListenerHandle,
    pub interest: BTreeSet<Address>,
    pub callback: UpdateCallback,
}

impl fmt::Debug for RegisteredListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredListener")
            .field("handle", &self.handle)
            .field("interest", &self.interest)
            .finish_non_exhaustive()
    }
}

/// Listeners in registration order.
///
/// The lock is only held while the list itself is read or changed, never
/// while callbacks run, so callbacks may register or deregister freely.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<Vec<RegisteredListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, or replace the interest and callback of an
    /// already registered handle while keeping its position.
    pub fn register(
        &self,
        handle: ListenerHandle,
        interest: impl IntoIterator<Item = Address>,
        callback: UpdateCallback,
    ) {
        let listener = RegisteredListener {
            handle,
            interest: interest.into_iter().collect(),
            callback,
        };
        let mut listeners = self.listeners.lock();
        match listeners.iter_mut().find(|l| l.handle == handle) {
            Some(existing) => *existing = listener,
            None => listeners.push(listener),
        }
    }

    /// Remove a listener. Returns false if the handle was not registered.
    pub fn deregister(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| l.handle != handle);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<RegisteredListener> {
        self.listeners.lock().clone()
    }

    /// Callbacks of listeners watching `address`, in registration order.
    pub fn watching(&self, address: Address) -> Vec<UpdateCallback> {
        self.listeners
            .lock()
            .iter()
            .filter(|l| l.interest.contains(&address))
            .map(|l| l.callback.clone())
            .collect()
    }

    /// Callbacks of every listener, in registration order.
    pub fn callbacks(&self) -> Vec<UpdateCallback> {
        self.listeners
            .lock()
            .iter()
            .map(|l| l.callback.clone())
            .collect()
    }
}

/// Listener interest inverted to addresses, rebuilt for every cycle.
#[derive(Debug)]
pub struct InterestMap {
    listeners: Vec<RegisteredListener>,
    /// Addresses in first-seen order, each with the indices (into
    /// `listeners`) of its watchers in registration order.
    entries: Vec<(Address, Vec<usize>)>,
}

impl InterestMap {
    pub fn build(listeners: Vec<RegisteredListener>) -> Self {
        let mut entries: Vec<(Address, Vec<usize>)> = Vec::new();
        let mut positions: HashMap<Address, usize> = HashMap::new();

        for (index, listener) in listeners.iter().enumerate() {
            for address in &listener.interest {
                let position = *positions.entry(*address).or_insert_with(|| {
                    entries.push((*address, Vec::new()));
                    entries.len() - 1
                });
                entries[position].1.push(index);
            }
        }

        Self { listeners, entries }
    }

    /// Addresses to fetch, in fetch order.
    pub fn addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.entries.iter().map(|(address, _)| *address)
    }

    pub fn entries(&self) -> &[(Address, Vec<usize>)] {
        &self.entries
    }

    pub fn listeners(&self) -> &[RegisteredListener] {
        &self.listeners
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
