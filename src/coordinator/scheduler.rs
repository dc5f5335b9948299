//! Periodic driver for the coordinator.

use super::refresh::Coordinator;
use crate::error::CoordinatorError;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Runs refresh cycles on a fixed interval and whenever one is requested.
///
/// The first cycle starts immediately, so entities registered during setup
/// get their values without waiting a full interval.
pub struct UpdateLoop {
    coordinator: Arc<Coordinator>,
    period: Duration,
}

impl UpdateLoop {
    pub fn new(coordinator: Arc<Coordinator>, period: Duration) -> Self {
        Self {
            coordinator,
            period,
        }
    }

    /// Spawn the loop. It ends when the coordinator is shut down.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        info!(
            "[Update] {} polling every {:?}",
            self.coordinator.name(),
            self.period
        );

        let cancel = self.coordinator.cancellation_token();
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = self.coordinator.refresh_requested() => {
                    debug!("[Update] Refresh requested");
                }
            }

            if let Err(CoordinatorError::Cancelled) = run_cycle(&self.coordinator).await {
                break;
            }
        }

        info!("[Update] {} update loop stopped", self.coordinator.name());
    }
}

/// Run one cycle and record its outcome on the coordinator.
///
/// When a cycle fails after a successful one, every listener is notified so
/// entities can report themselves unavailable.
pub async fn run_cycle(coordinator: &Coordinator) -> Result<usize, CoordinatorError> {
    match coordinator.refresh().await {
        Ok(refreshed) => {
            if coordinator.record_update(true) {
                info!("[Update] {} recovered", coordinator.name());
            }
            debug!("[Update] Refreshed {} coil(s)", refreshed.len());
            Ok(refreshed.len())
        }
        Err(CoordinatorError::Cancelled) => Err(CoordinatorError::Cancelled),
        Err(e) => {
            warn!("[Update] {}: {}", coordinator.name(), e);
            if coordinator.record_update(false) {
                coordinator.notify_listeners();
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::coordinator::ListenerHandle;
    use crate::device::HeatPumpModel;
    use crate::error::FetchError;
    use crate::source::{Coil, CoilValue, SimulatedHeatPump};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn setup() -> (Arc<SimulatedHeatPump>, Arc<Coordinator>, Arc<AtomicU32>) {
        let pump = Arc::new(
            SimulatedHeatPump::empty(HeatPumpModel::F1155)
                .with_coil(Coil::new(1, "a", "A"), CoilValue::Integer(1)),
        );
        let coordinator = Arc::new(Coordinator::new(
            &CoordinatorConfig::default(),
            HeatPumpModel::F1155,
            pump.clone(),
        ));
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        coordinator.register(
            ListenerHandle::new(),
            [1],
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (pump, coordinator, calls)
    }

    #[tokio::test]
    async fn test_failure_marks_unsuccessful_and_broadcasts_once() {
        let (pump, coordinator, calls) = setup();
        assert_eq!(assert_ok!(run_cycle(&coordinator).await), 1);
        assert!(coordinator.last_update_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        pump.fail_next_read(1, FetchError::Fatal("bad".into()));
        assert_err!(run_cycle(&coordinator).await);
        assert!(!coordinator.last_update_success());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // still failing: no repeated broadcast
        pump.fail_next_read(1, FetchError::Fatal("bad".into()));
        assert_err!(run_cycle(&coordinator).await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert_ok!(run_cycle(&coordinator).await);
        assert!(coordinator.last_update_success());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_loop_refreshes_immediately_and_on_request() {
        let (pump, coordinator, calls) = setup();
        let handle = UpdateLoop::new(coordinator.clone(), Duration::from_secs(3600)).start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pump.read_log(), vec![1]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        coordinator.request_refresh();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pump.read_log(), vec![1, 1]);

        coordinator.shutdown().await;
        assert_ok!(handle.await);
        assert!(!pump.is_running());
    }
}
