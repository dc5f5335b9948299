//! The coordinator: refresh cycles, writes and listener fan-out.

use super::cache::{CachedValue, CoilCache};
use super::listeners::{
    InterestMap, ListenerHandle, ListenerRegistry, RegisteredListener, UpdateCallback,
};
use super::retry::{RetryError, retry_if};
use crate::config::CoordinatorConfig;
use crate::device::{DeviceInfo, HeatPumpModel};
use crate::error::{CoordinatorError, FetchError};
use crate::source::{Address, CoilSource, CoilValue};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

/// Polls a coil source for the coils its listeners care about.
///
/// Two async locks order the work:
/// - `cycle` admits one refresh cycle at a time; overlapping calls queue.
/// - `transport` covers one transport call together with the cache write and
///   notifications that follow it. Writes take it too, so a write only ever
///   lands between two per-address steps of a cycle.
pub struct Coordinator {
    name: String,
    unique_id: String,
    model: HeatPumpModel,
    read_retries: u32,
    source: Arc<dyn CoilSource>,
    cache: CoilCache,
    listeners: ListenerRegistry,
    cycle: Mutex<()>,
    transport: Mutex<()>,
    last_update_success: AtomicBool,
    refresh_requested: Notify,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(
        config: &CoordinatorConfig,
        model: HeatPumpModel,
        source: Arc<dyn CoilSource>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            unique_id: config.unique_id.clone(),
            model,
            read_retries: config.read_retries,
            source,
            cache: CoilCache::new(),
            listeners: ListenerRegistry::new(),
            cycle: Mutex::new(()),
            transport: Mutex::new(()),
            last_update_success: AtomicBool::new(true),
            refresh_requested: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn model(&self) -> HeatPumpModel {
        self.model
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo::new(&self.unique_id, self.model)
    }

    /// Open the source connection.
    pub async fn start(&self) -> Result<(), CoordinatorError> {
        self.source
            .start()
            .await
            .map_err(CoordinatorError::StartFailed)?;
        info!("[Coordinator] {} started", self.name);
        Ok(())
    }

    /// Cancel any in-flight work and close the source connection.
    ///
    /// A refresh cycle or retry loop running at this point ends with
    /// [`CoordinatorError::Cancelled`].
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.source.stop().await;
        info!("[Coordinator] {} stopped", self.name);
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn register(
        &self,
        handle: ListenerHandle,
        interest: impl IntoIterator<Item = Address>,
        callback: UpdateCallback,
    ) {
        self.listeners.register(handle, interest, callback);
    }

    pub fn deregister(&self, handle: ListenerHandle) -> bool {
        self.listeners.deregister(handle)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Whether the most recent refresh cycle completed.
    pub fn last_update_success(&self) -> bool {
        self.last_update_success.load(Ordering::SeqCst)
    }

    /// Record the outcome of a cycle. Returns true if the flag changed.
    pub(crate) fn record_update(&self, success: bool) -> bool {
        self.last_update_success.swap(success, Ordering::SeqCst) != success
    }

    /// Ask the update loop for a cycle outside the regular interval.
    pub fn request_refresh(&self) {
        self.refresh_requested.notify_one();
    }

    pub(crate) async fn refresh_requested(&self) {
        self.refresh_requested.notified().await;
    }

    /// Invoke every registered listener once.
    pub fn notify_listeners(&self) {
        for callback in self.listeners.callbacks() {
            callback();
        }
    }

    pub fn get(&self, address: Address) -> Option<CachedValue> {
        self.cache.get(address)
    }

    pub fn value(&self, address: Address) -> Option<CoilValue> {
        self.cache.get(address).map(|c| c.value)
    }

    /// Cached value as a float. Zero is a valid value, not "missing".
    pub fn float_value(&self, address: Address) -> Option<f64> {
        self.value(address).and_then(|v| v.as_f64())
    }

    pub fn has_data(&self) -> bool {
        !self.cache.is_empty()
    }

    /// Copy of everything cached so far.
    pub fn data(&self) -> HashMap<Address, CachedValue> {
        self.cache.snapshot()
    }

    /// Run one refresh cycle.
    ///
    /// Fetches exactly the union of the registered listeners' interests and
    /// returns the values refreshed by this cycle. Coils the device does not
    /// have are skipped. Transient read errors are retried up to the
    /// configured attempt count; exhausting them, or any fatal error, ends
    /// the cycle with [`CoordinatorError::RefreshFailed`]. Values stored
    /// before the failure stay stored.
    ///
    /// Each listener is called at most once per cycle: right after the last
    /// of its addresses has been resolved, and only if at least one of them
    /// was refreshed. When the cycle aborts, listeners still waiting on an
    /// address are called before the error is returned if one of their
    /// addresses was refreshed.
    pub async fn refresh(&self) -> Result<HashMap<Address, CachedValue>, CoordinatorError> {
        let _cycle = self.cycle.lock().await;
        if self.cancel.is_cancelled() {
            return Err(CoordinatorError::Cancelled);
        }

        let interest = InterestMap::build(self.listeners.snapshot());
        let listeners = interest.listeners();
        let mut unresolved: Vec<usize> = listeners.iter().map(|l| l.interest.len()).collect();
        let mut refreshed = vec![false; listeners.len()];
        let mut result = HashMap::new();

        debug!(
            "[Coordinator] Refreshing {} coil(s) for {} listener(s)",
            interest.len(),
            listeners.len()
        );

        for (address, watchers) in interest.entries() {
            let address = *address;
            let _transport = self.transport.lock().await;

            match self.read_coil(address).await {
                Ok(Some(cached)) => {
                    result.insert(address, cached);
                    for &w in watchers {
                        refreshed[w] = true;
                    }
                }
                Ok(None) => {
                    debug!("[Coordinator] Coil {} superseded by a newer write", address);
                }
                Err(RetryError::Rejected(FetchError::NotFound(_))) => {
                    debug!("[Coordinator] Skipping missing coil: {}", address);
                }
                Err(RetryError::Cancelled) => {
                    info!("[Coordinator] Refresh abandoned at coil {}", address);
                    notify_pending(listeners, &unresolved, &refreshed);
                    return Err(CoordinatorError::Cancelled);
                }
                Err(RetryError::Exhausted { last, .. }) | Err(RetryError::Rejected(last)) => {
                    warn!("[Coordinator] Failed to update coil {}: {}", address, last);
                    notify_pending(listeners, &unresolved, &refreshed);
                    return Err(CoordinatorError::RefreshFailed {
                        address,
                        source: last,
                    });
                }
            }

            for &w in watchers {
                unresolved[w] -= 1;
                if unresolved[w] == 0 && refreshed[w] {
                    (listeners[w].callback)();
                }
            }
        }

        Ok(result)
    }

    /// Read one coil with retries and store the result.
    ///
    /// Returns `Ok(None)` if the cache already held a newer value.
    async fn read_coil(
        &self,
        address: Address,
    ) -> Result<Option<CachedValue>, RetryError<FetchError>> {
        let revision = self.cache.next_revision();
        let value = retry_if(self.read_retries, &self.cancel, |attempt| {
            if attempt > 1 {
                debug!("[Coordinator] Retrying coil {} (attempt {})", address, attempt);
            }
            self.source.read(address)
        })
        .await?;
        Ok(self.cache.store(revision, address, value))
    }

    /// Write a coil and cache the acknowledged value.
    ///
    /// Failures are returned as-is without retry and leave the cache
    /// untouched. Listeners watching the coil are notified only when the
    /// cache already held data before this write, so nothing is announced
    /// ahead of the first successful refresh.
    pub async fn write(
        &self,
        address: Address,
        value: CoilValue,
    ) -> Result<CoilValue, CoordinatorError> {
        if self.cancel.is_cancelled() {
            return Err(CoordinatorError::Cancelled);
        }

        let _transport = self.transport.lock().await;
        let revision = self.cache.next_revision();
        let had_data = self.has_data();

        let acknowledged = self
            .source
            .write(address, value)
            .await
            .map_err(|source| CoordinatorError::WriteFailed { address, source })?;

        self.cache.store(revision, address, acknowledged.clone());
        debug!("[Coordinator] Wrote coil {} = {}", address, acknowledged);

        if had_data {
            for callback in self.listeners.watching(address) {
                callback();
            }
        }

        Ok(acknowledged)
    }
}

/// Call the listeners that saw a refreshed coil but were never notified
/// because the cycle ended before their last address.
fn notify_pending(listeners: &[RegisteredListener], unresolved: &[usize], refreshed: &[bool]) {
    for (w, listener) in listeners.iter().enumerate() {
        if refreshed[w] && unresolved[w] > 0 {
            (listener.callback)();
        }
    }
}
