//! Coil database.
//!
//! A deliberately small slice of the registers a heat pump exposes, enough to
//! drive the bridge and its tests. Addresses follow the manufacturer's
//! numbering.

use super::{Address, Coil};
use crate::device::HeatPumpModel;

pub const BT1_OUTDOOR_TEMPERATURE: Address = 40004;
pub const BT2_SUPPLY_TEMPERATURE: Address = 40008;
pub const BT3_RETURN_TEMPERATURE: Address = 40012;
pub const BT7_HOT_WATER_TOP: Address = 40013;
pub const DEGREE_MINUTES: Address = 43005;
pub const COMPRESSOR_STARTS: Address = 43416;
pub const COMPRESSOR_OPERATING_TIME: Address = 43420;
pub const HEAT_OFFSET_S1: Address = 47011;
pub const HOT_WATER_COMFORT_MODE: Address = 47041;

/// Coils available on every supported model.
fn common_coils() -> Vec<Coil> {
    vec![
        Coil::new(
            BT1_OUTDOOR_TEMPERATURE,
            "bt1-outdoor-temperature-40004",
            "BT1 Outdoor Temperature",
        )
        .with_unit("°C"),
        Coil::new(
            BT2_SUPPLY_TEMPERATURE,
            "bt2-supply-temp-s1-40008",
            "BT2 Supply temp S1",
        )
        .with_unit("°C"),
        Coil::new(BT3_RETURN_TEMPERATURE, "bt3-return-temp-40012", "BT3 Return temp")
            .with_unit("°C"),
        Coil::new(BT7_HOT_WATER_TOP, "bt7-hw-top-40013", "BT7 HW Top").with_unit("°C"),
        Coil::new(DEGREE_MINUTES, "degree-minutes-43005", "Degree Minutes")
            .with_unit("DM")
            .writable(),
        Coil::new(HEAT_OFFSET_S1, "heat-offset-s1-47011", "Heat Offset S1").writable(),
        Coil::new(
            HOT_WATER_COMFORT_MODE,
            "hot-water-comfort-mode-47041",
            "Hot water comfort mode",
        )
        .writable(),
    ]
}

/// Coils only present on models with an integrated compressor.
fn compressor_coils() -> Vec<Coil> {
    vec![
        Coil::new(
            COMPRESSOR_STARTS,
            "compressor-starts-eb100-ep14-43416",
            "Compressor starts EB100-EP14",
        ),
        Coil::new(
            COMPRESSOR_OPERATING_TIME,
            "compressor-operating-time-eb100-ep14-43420",
            "Compressor operating time EB100-EP14",
        )
        .with_unit("h"),
    ]
}

/// Every coil known for `model`, sorted by address.
pub fn coil_database(model: HeatPumpModel) -> Vec<Coil> {
    let mut coils = common_coils();
    if model.has_compressor() {
        coils.extend(compressor_coils());
    }
    coils.sort_by_key(|c| c.address);
    coils
}

/// Look up a coil by address, or by its machine name.
pub fn find_coil(model: HeatPumpModel, key: &str) -> Option<Coil> {
    let by_address = key.parse::<Address>().ok();
    coil_database(model)
        .into_iter()
        .find(|c| Some(c.address) == by_address || c.name == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_is_sorted_and_model_specific() {
        let full = coil_database(HeatPumpModel::F1255);
        assert!(full.windows(2).all(|w| w[0].address < w[1].address));
        assert!(full.iter().any(|c| c.address == COMPRESSOR_STARTS));

        let smo = coil_database(HeatPumpModel::SMO40);
        assert_eq!(smo.len(), full.len() - 2);
        assert!(!smo.iter().any(|c| c.address == COMPRESSOR_OPERATING_TIME));
    }

    #[test]
    fn test_find_coil_by_address_or_name() {
        let by_address = find_coil(HeatPumpModel::F1155, "40004").unwrap();
        assert_eq!(by_address.name, "bt1-outdoor-temperature-40004");

        let by_name = find_coil(HeatPumpModel::F1155, "heat-offset-s1-47011").unwrap();
        assert_eq!(by_name.address, HEAT_OFFSET_S1);
        assert!(by_name.writable);

        assert!(find_coil(HeatPumpModel::SMO40, "43416").is_none());
    }
}
