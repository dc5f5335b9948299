//! Selective refresh coordinator.
//!
//! Entities register as listeners for the coil addresses they display. Each
//! refresh cycle fetches exactly the addresses some listener is interested
//! in, one at a time, and notifies only the listeners whose data was
//! refreshed. Values of coils nobody listens to stay cached untouched.
//!
//! The coordinator never schedules itself; [`UpdateLoop`] drives it on an
//! interval and on demand.

pub mod cache;
pub mod listeners;
pub mod refresh;
pub mod retry;
pub mod scheduler;

pub use cache::{CachedValue, CoilCache};
pub use listeners::{ListenerHandle, ListenerRegistry, UpdateCallback};
pub use refresh::Coordinator;
pub use retry::{RetryError, Retryable, retry_if};
pub use scheduler::UpdateLoop;
