//! Entity backed by a single coil.
//!
//! Registers itself with the coordinator as a listener for its coil address.
//! On notification it pulls the cached value and bumps a version counter,
//! the same change-detection scheme the sensors use elsewhere in the bridge.

use super::description::EntityDescription;
use crate::coordinator::{CachedValue, Coordinator, ListenerHandle};
use crate::device::DeviceInfo;
use crate::error::CoordinatorError;
use crate::source::{Address, Coil, CoilValue};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

#[derive(Default)]
struct EntityState {
    value: RwLock<Option<CachedValue>>,
    version: AtomicU32,
}

impl EntityState {
    fn handle_coordinator_update(&self, coordinator: &Coordinator, address: Address) {
        let Some(cached) = coordinator.get(address) else {
            return;
        };
        *self.value.write() = Some(cached);
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct CoilEntity {
    coordinator: Arc<Coordinator>,
    coil: Coil,
    description: EntityDescription,
    entity_id: String,
    unique_id: String,
    handle: ListenerHandle,
    state: Arc<EntityState>,
}

impl CoilEntity {
    /// Create the entity and start listening for its coil.
    pub fn attach(
        coordinator: Arc<Coordinator>,
        coil: Coil,
        description: EntityDescription,
    ) -> Self {
        let handle = ListenerHandle::new();
        let state = Arc::new(EntityState::default());
        let platform = description.platform(&coil);

        let weak: Weak<Coordinator> = Arc::downgrade(&coordinator);
        let listener_state = state.clone();
        let address = coil.address;
        coordinator.register(
            handle,
            [address],
            Arc::new(move || {
                if let Some(coordinator) = weak.upgrade() {
                    listener_state.handle_coordinator_update(&coordinator, address);
                }
            }),
        );

        Self {
            entity_id: format!("{}.{}", platform, coil.name.replace('-', "_")),
            unique_id: format!("{}-{}", coordinator.unique_id(), coil.address),
            coordinator,
            coil,
            description,
            handle,
            state,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.coil.title
    }

    pub fn coil(&self) -> &Coil {
        &self.coil
    }

    pub fn description(&self) -> &EntityDescription {
        &self.description
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.coordinator.device_info()
    }

    /// Available while the last cycle succeeded and the coil has been read.
    pub fn available(&self) -> bool {
        self.coordinator.last_update_success()
            && self.coordinator.get(self.coil.address).is_some()
    }

    /// Value as of the last notification.
    pub fn value(&self) -> Option<CoilValue> {
        self.state.value.read().as_ref().map(|c| c.value.clone())
    }

    pub fn float_value(&self) -> Option<f64> {
        self.value().and_then(|v| v.as_f64())
    }

    pub fn last_updated(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.state.value.read().as_ref().map(|c| c.last_updated)
    }

    /// Incremented on every update received.
    pub fn version(&self) -> u32 {
        self.state.version.load(Ordering::SeqCst)
    }

    pub async fn write(&self, value: CoilValue) -> Result<CoilValue, CoordinatorError> {
        self.coordinator.write(self.coil.address, value).await
    }
}

impl Drop for CoilEntity {
    fn drop(&mut self) {
        self.coordinator.deregister(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::device::HeatPumpModel;
    use crate::error::FetchError;
    use crate::source::SimulatedHeatPump;
    use crate::source::coils::{BT1_OUTDOOR_TEMPERATURE, HEAT_OFFSET_S1};
    use tokio_test::assert_ok;

    fn setup() -> (Arc<SimulatedHeatPump>, Arc<Coordinator>) {
        let pump = Arc::new(SimulatedHeatPump::new(HeatPumpModel::F1255));
        let coordinator = Arc::new(Coordinator::new(
            &CoordinatorConfig::default(),
            HeatPumpModel::F1255,
            pump.clone(),
        ));
        (pump, coordinator)
    }

    fn entity(
        pump: &SimulatedHeatPump,
        coordinator: &Arc<Coordinator>,
        address: Address,
    ) -> CoilEntity {
        let coil = pump.coil(address).unwrap();
        let description = EntityDescription::for_coil(&coil);
        CoilEntity::attach(coordinator.clone(), coil, description)
    }

    #[tokio::test]
    async fn test_entity_follows_refresh() {
        let (pump, coordinator) = setup();
        let outdoor = entity(&pump, &coordinator, BT1_OUTDOOR_TEMPERATURE);

        assert_eq!(outdoor.entity_id(), "sensor.bt1_outdoor_temperature_40004");
        assert_eq!(outdoor.unique_id(), "nibe-heatpump-40004");
        assert!(!outdoor.available());
        assert_eq!(outdoor.value(), None);

        assert_ok!(coordinator.refresh().await);
        assert!(outdoor.available());
        assert_eq!(outdoor.float_value(), Some(4.5));
        assert_eq!(outdoor.version(), 1);
        assert!(outdoor.last_updated().is_some());
    }

    #[tokio::test]
    async fn test_unavailable_after_failed_cycle() {
        let (pump, coordinator) = setup();
        let outdoor = entity(&pump, &coordinator, BT1_OUTDOOR_TEMPERATURE);
        assert_ok!(crate::coordinator::scheduler::run_cycle(&coordinator).await);
        assert!(outdoor.available());

        pump.fail_next_read(BT1_OUTDOOR_TEMPERATURE, FetchError::Fatal("bad".into()));
        let _ = crate::coordinator::scheduler::run_cycle(&coordinator).await;
        assert!(!outdoor.available());
        // the failure broadcast re-reads the retained value
        assert_eq!(outdoor.version(), 2);
        assert_eq!(outdoor.float_value(), Some(4.5));
    }

    #[tokio::test]
    async fn test_write_updates_entity_after_first_refresh() {
        let (pump, coordinator) = setup();
        let offset = entity(&pump, &coordinator, HEAT_OFFSET_S1);
        assert_eq!(offset.entity_id(), "number.heat_offset_s1_47011");

        assert_ok!(coordinator.refresh().await);
        assert_eq!(offset.value(), Some(CoilValue::Integer(0)));

        assert_ok!(offset.write(CoilValue::Integer(2)).await);
        assert_eq!(offset.value(), Some(CoilValue::Integer(2)));
        assert_eq!(offset.version(), 2);
        assert_eq!(pump.value(HEAT_OFFSET_S1), Some(CoilValue::Integer(2)));
    }

    #[tokio::test]
    async fn test_drop_deregisters() {
        let (pump, coordinator) = setup();
        {
            let _outdoor = entity(&pump, &coordinator, BT1_OUTDOOR_TEMPERATURE);
            assert_eq!(coordinator.listener_count(), 1);
        }
        assert_eq!(coordinator.listener_count(), 0);
        assert_ok!(coordinator.refresh().await);
        assert!(pump.read_log().is_empty());
    }
}
