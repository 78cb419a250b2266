//! Device resources as returned by the SDM API
//!
//! Traits are kept as raw JSON: Google adds traits freely and only a few
//! are read here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const THERMOSTAT_TYPE: &str = "sdm.devices.types.THERMOSTAT";

pub const TEMPERATURE_TRAIT: &str = "sdm.devices.traits.Temperature";
pub const SETPOINT_TRAIT: &str = "sdm.devices.traits.ThermostatTemperatureSetpoint";

/// Device ids are a single path segment of ASCII letters, digits, `-` and `_`.
pub fn is_valid_device_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParentRelation {
    #[serde(default)]
    pub parent: String,
    #[serde(default, rename = "displayName")]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Full resource name: `enterprises/{project}/devices/{id}`
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub traits: Map<String, Value>,
    #[serde(default, rename = "parentRelations")]
    pub parent_relations: Vec<ParentRelation>,
}

impl Device {
    /// Last path segment of the resource name.
    pub fn device_id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    /// Room name assigned in the Google Home app, falling back to the device id.
    pub fn display_name(&self) -> &str {
        self.parent_relations
            .iter()
            .map(|p| p.display_name.as_str())
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| self.device_id())
    }

    pub fn is_thermostat(&self) -> bool {
        self.device_type == THERMOSTAT_TYPE
    }

    pub fn ambient_temperature(&self) -> Option<f32> {
        self.trait_number(TEMPERATURE_TRAIT, "ambientTemperatureCelsius")
    }

    /// Current heating setpoint in Celsius. `None` when the thermostat is
    /// not in a mode that exposes one (e.g. OFF or COOL).
    pub fn heat_setpoint(&self) -> Option<f32> {
        self.trait_number(SETPOINT_TRAIT, "heatCelsius")
    }

    fn trait_number(&self, trait_name: &str, field: &str) -> Option<f32> {
        self.traits
            .get(trait_name)?
            .get(field)?
            .as_f64()
            .map(|v| v as f32)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Devices {
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl Devices {
    pub fn thermostats(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.is_thermostat())
    }
}
