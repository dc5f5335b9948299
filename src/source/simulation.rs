//! Simulated heat pump for development and testing.
//!
//! Holds a small coil database in memory and answers reads and writes the way
//! a gateway would, including scripted failures so coordinator behaviour can
//! be exercised without hardware.

use super::coils::{
    BT1_OUTDOOR_TEMPERATURE, BT2_SUPPLY_TEMPERATURE, BT3_RETURN_TEMPERATURE, BT7_HOT_WATER_TOP,
    COMPRESSOR_OPERATING_TIME, COMPRESSOR_STARTS, DEGREE_MINUTES, HOT_WATER_COMFORT_MODE,
    coil_database,
};
use super::{Address, Coil, CoilSource, CoilValue, FetchResult};
use crate::device::HeatPumpModel;
use crate::error::FetchError;
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Read attempts kept in the log; older entries are dropped.
pub const READ_LOG_CAPACITY: usize = 1024;

/// Plausible starting values for a heat pump in winter operation.
fn initial_value(address: Address) -> CoilValue {
    match address {
        BT1_OUTDOOR_TEMPERATURE => CoilValue::Float(4.5),
        BT2_SUPPLY_TEMPERATURE => CoilValue::Float(35.2),
        BT3_RETURN_TEMPERATURE => CoilValue::Float(29.8),
        BT7_HOT_WATER_TOP => CoilValue::Float(48.1),
        DEGREE_MINUTES => CoilValue::Float(-120.0),
        COMPRESSOR_STARTS => CoilValue::Integer(1843),
        COMPRESSOR_OPERATING_TIME => CoilValue::Integer(9120),
        HOT_WATER_COMFORT_MODE => CoilValue::Integer(1),
        _ => CoilValue::Integer(0),
    }
}

/// In-memory heat pump implementing [`CoilSource`].
pub struct SimulatedHeatPump {
    model: HeatPumpModel,
    coils: RwLock<HashMap<Address, (Coil, CoilValue)>>,
    read_failures: Mutex<HashMap<Address, VecDeque<FetchError>>>,
    write_failures: Mutex<HashMap<Address, VecDeque<FetchError>>>,
    read_log: Mutex<VecDeque<Address>>,
    read_delay: Option<Duration>,
    running: AtomicBool,
}

impl SimulatedHeatPump {
    /// Create a heat pump populated with the coil database for `model`.
    pub fn new(model: HeatPumpModel) -> Self {
        let coils = coil_database(model);
        let pump = Self::empty(model);
        {
            let mut table = pump.coils.write();
            for coil in coils {
                let value = initial_value(coil.address);
                table.insert(coil.address, (coil, value));
            }
        }
        pump
    }

    /// Create a heat pump with no coils at all.
    pub fn empty(model: HeatPumpModel) -> Self {
        Self {
            model,
            coils: RwLock::new(HashMap::new()),
            read_failures: Mutex::new(HashMap::new()),
            write_failures: Mutex::new(HashMap::new()),
            read_log: Mutex::new(VecDeque::new()),
            read_delay: None,
            running: AtomicBool::new(false),
        }
    }

    /// Add or replace a coil.
    pub fn with_coil(self, coil: Coil, value: CoilValue) -> Self {
        self.coils.write().insert(coil.address, (coil, value));
        self
    }

    /// Delay every read, emulating a slow serial gateway.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn model(&self) -> HeatPumpModel {
        self.model
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Coil descriptors sorted by address.
    pub fn coils(&self) -> Vec<Coil> {
        let mut coils: Vec<Coil> = self.coils.read().values().map(|(c, _)| c.clone()).collect();
        coils.sort_by_key(|c| c.address);
        coils
    }

    pub fn coil(&self, address: Address) -> Option<Coil> {
        self.coils.read().get(&address).map(|(c, _)| c.clone())
    }

    /// Change a value on the device side, as the heat pump itself would.
    pub fn set_value(&self, address: Address, value: CoilValue) {
        if let Some(entry) = self.coils.write().get_mut(&address) {
            entry.1 = value;
        }
    }

    /// Current device-side value, bypassing the transport.
    pub fn value(&self, address: Address) -> Option<CoilValue> {
        self.coils.read().get(&address).map(|(_, v)| v.clone())
    }

    /// Queue an error to be returned by the next read of `address`.
    pub fn fail_next_read(&self, address: Address, error: FetchError) {
        self.read_failures
            .lock()
            .entry(address)
            .or_default()
            .push_back(error);
    }

    /// Queue an error to be returned by the next write of `address`.
    pub fn fail_next_write(&self, address: Address, error: FetchError) {
        self.write_failures
            .lock()
            .entry(address)
            .or_default()
            .push_back(error);
    }

    /// The most recent read attempts, oldest first.
    pub fn read_log(&self) -> Vec<Address> {
        self.read_log.lock().iter().copied().collect()
    }

    pub fn clear_read_log(&self) {
        self.read_log.lock().clear();
    }

    fn take_failure(
        failures: &Mutex<HashMap<Address, VecDeque<FetchError>>>,
        address: Address,
    ) -> Option<FetchError> {
        failures.lock().get_mut(&address).and_then(|q| q.pop_front())
    }
}

#[async_trait]
impl CoilSource for SimulatedHeatPump {
    async fn read(&self, address: Address) -> FetchResult {
        {
            let mut log = self.read_log.lock();
            if log.len() == READ_LOG_CAPACITY {
                log.pop_front();
            }
            log.push_back(address);
        }

        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = Self::take_failure(&self.read_failures, address) {
            debug!("[Sim] Read of coil {} fails with: {}", address, error);
            return Err(error);
        }

        self.coils
            .read()
            .get(&address)
            .map(|(_, v)| v.clone())
            .ok_or(FetchError::NotFound(address))
    }

    async fn write(&self, address: Address, value: CoilValue) -> FetchResult {
        if let Some(error) = Self::take_failure(&self.write_failures, address) {
            debug!("[Sim] Write of coil {} fails with: {}", address, error);
            return Err(error);
        }

        let mut coils = self.coils.write();
        let (coil, current) = coils
            .get_mut(&address)
            .ok_or(FetchError::NotFound(address))?;
        if !coil.writable {
            return Err(FetchError::Fatal(format!("coil {} is read-only", address)));
        }
        *current = value.clone();
        Ok(value)
    }

    async fn start(&self) -> Result<(), FetchError> {
        info!("[Sim] Simulated {} gateway started", self.model);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        info!("[Sim] Simulated {} gateway stopped", self.model);
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Spawn a task that slowly drifts temperatures on the simulated pump.
///
/// Useful for watching entities update while running the bridge binary.
pub fn run_drift_simulation(pump: Arc<SimulatedHeatPump>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval(period);
        let mut step: i64 = 0;
        loop {
            interval.tick().await;
            step += 1;
            let delta = if step % 2 == 0 { 0.3 } else { -0.2 };
            for address in [BT1_OUTDOOR_TEMPERATURE, BT2_SUPPLY_TEMPERATURE] {
                if let Some(current) = pump.value(address).and_then(|v| v.as_f64()) {
                    let next = ((current + delta) * 10.0).round() / 10.0;
                    pump.set_value(address, CoilValue::Float(next));
                    debug!("[Sim] Coil {} drifted to {}", address, next);
                }
            }
        }
    })
}
