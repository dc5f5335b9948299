//! Platform entities backed by coordinator data.
//!
//! Each entity wraps one coil, listens for it on the coordinator and carries
//! an [`EntityDescription`] with its presentation metadata.

pub mod coil_entity;
pub mod description;

pub use coil_entity::CoilEntity;
pub use description::{DeviceClass, EntityCategory, EntityDescription, Platform, StateClass};

use crate::coordinator::Coordinator;
use crate::source::Coil;
use log::info;
use std::sync::Arc;

/// Create entities for the given coils.
///
/// Coils whose description is disabled by default are skipped unless
/// `include_disabled` is set.
pub fn setup_entities(
    coordinator: &Arc<Coordinator>,
    coils: impl IntoIterator<Item = Coil>,
    include_disabled: bool,
) -> Vec<CoilEntity> {
    let entities: Vec<CoilEntity> = coils
        .into_iter()
        .map(|coil| (EntityDescription::for_coil(&coil), coil))
        .filter(|(description, _)| include_disabled || description.enabled_by_default)
        .map(|(description, coil)| CoilEntity::attach(coordinator.clone(), coil, description))
        .collect();

    info!(
        "[Entity] Set up {} entities for {}",
        entities.len(),
        coordinator.name()
    );
    entities
}
