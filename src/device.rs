//! Heat pump models and the device record entities attach to.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Integration domain used in device identifiers.
pub const DOMAIN: &str = "nibe_heatpump";

pub const MANUFACTURER: &str = "NIBE Energy Systems";

/// Supported heat pump models.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum HeatPumpModel {
    F1145,
    F1155,
    F1245,
    F1255,
    F1345,
    F1355,
    F370,
    F470,
    F730,
    F750,
    SMO20,
    SMO40,
    VVM225,
    VVM310,
    VVM320,
    VVM325,
    VVM500,
}

impl HeatPumpModel {
    /// Indoor modules (SMO) drive an external compressor and expose no
    /// compressor coils of their own.
    pub fn has_compressor(&self) -> bool {
        !matches!(self, HeatPumpModel::SMO20 | HeatPumpModel::SMO40)
    }
}

/// Device record for the heat pump, shared by all of its entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// `(domain, unique id)` pairs
    pub identifiers: Vec<(String, String)>,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
}

impl DeviceInfo {
    pub fn new(unique_id: &str, model: HeatPumpModel) -> Self {
        Self {
            identifiers: vec![(DOMAIN.to_string(), unique_id.to_string())],
            manufacturer: MANUFACTURER.to_string(),
            model: model.to_string(),
            name: model.to_string(),
        }
    }
}
