//! Presentation metadata for coil entities.

use crate::source::coils::{
    BT1_OUTDOOR_TEMPERATURE, COMPRESSOR_OPERATING_TIME, COMPRESSOR_STARTS, DEGREE_MINUTES,
};
use crate::source::{Address, Coil};
use serde::Serialize;
use strum::{Display, EnumString};

/// Entity platform a coil is exposed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    Sensor,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum DeviceClass {
    Temperature,
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum StateClass {
    Measurement,
    TotalIncreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum EntityCategory {
    Config,
    Diagnostic,
}

/// How an entity presents its coil.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDescription {
    pub key: String,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub device_class: Option<DeviceClass>,
    pub state_class: Option<StateClass>,
    pub icon: Option<&'static str>,
    pub entity_category: Option<EntityCategory>,
    pub enabled_by_default: bool,
}

impl EntityDescription {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            unit: None,
            device_class: None,
            state_class: None,
            icon: None,
            entity_category: None,
            // the coil database is large; users opt in per coil
            enabled_by_default: false,
        }
    }

    /// Description derived from the coil's own metadata.
    pub fn for_coil(coil: &Coil) -> Self {
        let mut description = Self::new(coil.name.clone());
        description.name = Some(coil.title.clone());
        description.unit = coil.unit.clone();

        match coil.unit.as_deref() {
            Some("°C") => {
                description.device_class = Some(DeviceClass::Temperature);
                description.state_class = Some(StateClass::Measurement);
            }
            Some("h") => {
                description.device_class = Some(DeviceClass::Duration);
                description.state_class = Some(StateClass::TotalIncreasing);
            }
            _ => {}
        }

        if coil.writable {
            description.entity_category = Some(EntityCategory::Config);
        }

        apply_overrides(coil.address, &mut description);
        description
    }

    pub fn platform(&self, coil: &Coil) -> Platform {
        if coil.writable {
            Platform::Number
        } else {
            Platform::Sensor
        }
    }
}

/// Per-coil adjustments on top of the unit-derived defaults.
fn apply_overrides(address: Address, description: &mut EntityDescription) {
    match address {
        BT1_OUTDOOR_TEMPERATURE => {
            description.icon = Some("mdi:thermometer");
            description.enabled_by_default = true;
        }
        DEGREE_MINUTES => {
            description.icon = Some("mdi:thermometer-lines");
            description.state_class = Some(StateClass::Measurement);
        }
        COMPRESSOR_STARTS => {
            description.icon = Some("mdi:counter");
            description.state_class = Some(StateClass::TotalIncreasing);
            description.entity_category = Some(EntityCategory::Diagnostic);
        }
        COMPRESSOR_OPERATING_TIME => {
            description.entity_category = Some(EntityCategory::Diagnostic);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_coil() {
        let coil = Coil::new(40008, "bt2-supply-temp-s1-40008", "BT2 Supply temp S1")
            .with_unit("°C");
        let d = EntityDescription::for_coil(&coil);
        assert_eq!(d.key, "bt2-supply-temp-s1-40008");
        assert_eq!(d.name.as_deref(), Some("BT2 Supply temp S1"));
        assert_eq!(d.device_class, Some(DeviceClass::Temperature));
        assert_eq!(d.state_class, Some(StateClass::Measurement));
        assert!(!d.enabled_by_default);
        assert_eq!(d.platform(&coil), Platform::Sensor);
    }

    #[test]
    fn test_writable_coil_is_config_number() {
        let coil = Coil::new(47011, "heat-offset-s1-47011", "Heat Offset S1").writable();
        let d = EntityDescription::for_coil(&coil);
        assert_eq!(d.entity_category, Some(EntityCategory::Config));
        assert_eq!(d.platform(&coil), Platform::Number);
        assert_eq!(d.device_class, None);
    }

    #[test]
    fn test_overrides() {
        let outdoor = Coil::new(BT1_OUTDOOR_TEMPERATURE, "bt1", "BT1").with_unit("°C");
        let d = EntityDescription::for_coil(&outdoor);
        assert!(d.enabled_by_default);
        assert_eq!(d.icon, Some("mdi:thermometer"));

        let starts = Coil::new(COMPRESSOR_STARTS, "starts", "Starts");
        let d = EntityDescription::for_coil(&starts);
        assert_eq!(d.state_class, Some(StateClass::TotalIncreasing));
        assert_eq!(d.entity_category, Some(EntityCategory::Diagnostic));
    }

    #[test]
    fn test_coil_database_uses_every_variant() {
        let coils = crate::source::coils::coil_database(crate::device::HeatPumpModel::F1255);
        let descriptions: Vec<_> = coils
            .iter()
            .map(|c| (EntityDescription::for_coil(c), c))
            .collect();

        for platform in [Platform::Sensor, Platform::Number] {
            assert!(descriptions.iter().any(|(d, c)| d.platform(c) == platform));
        }
        for class in [DeviceClass::Temperature, DeviceClass::Duration] {
            assert!(descriptions.iter().any(|(d, _)| d.device_class == Some(class)));
        }
        for category in [EntityCategory::Config, EntityCategory::Diagnostic] {
            assert!(descriptions.iter().any(|(d, _)| d.entity_category == Some(category)));
        }
    }

    #[test]
    fn test_platform_names() {
        assert_eq!(Platform::Number.to_string(), "number");
        assert_eq!(DeviceClass::Duration.to_string(), "duration");
        assert_eq!(StateClass::TotalIncreasing.to_string(), "total_increasing");
    }
}
