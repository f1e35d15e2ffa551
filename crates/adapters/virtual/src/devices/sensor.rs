//! Virtual temperature sensor.

use std::sync::Arc;

use homecore_domain::config::{HubConfig, TemperatureUnit};
use homecore_domain::entity::{ATTR_FRIENDLY_NAME, Attributes};
use homecore_domain::service::ServiceCall;
use parking_lot::Mutex;

use super::Reading;

pub const ATTR_UNIT_OF_MEASUREMENT: &str = "unit_of_measurement";
const DEFAULT_CELSIUS: f64 = 21.5;

/// A simulated thermometer measuring in Celsius and reporting in the hub's
/// configured unit. `set_value` with `{"value": <celsius>}` changes the
/// reading.
pub struct VirtualSensor {
    name: String,
    config: Arc<HubConfig>,
    celsius: Mutex<f64>,
}

impl VirtualSensor {
    #[must_use]
    pub fn new(name: impl Into<String>, config: Arc<HubConfig>) -> Self {
        Self {
            name: name.into(),
            config,
            celsius: Mutex::new(DEFAULT_CELSIUS),
        }
    }

    #[must_use]
    pub fn reading(&self) -> Reading {
        self.reading_of(*self.celsius.lock())
    }

    fn reading_of(&self, celsius: f64) -> Reading {
        let value = self.config.temperature(celsius, TemperatureUnit::Celsius);
        let mut attributes = Attributes::new();
        attributes.insert(ATTR_FRIENDLY_NAME.to_string(), self.name.clone().into());
        attributes.insert(
            ATTR_UNIT_OF_MEASUREMENT.to_string(),
            self.config.temperature_unit.symbol().into(),
        );
        Reading {
            state: value.to_string(),
            attributes,
        }
    }

    pub fn handle_service(&self, call: &ServiceCall) -> Reading {
        let mut celsius = self.celsius.lock();
        if call.service() == "set_value"
            && let Some(value) = call.data().get("value").and_then(serde_json::Value::as_f64)
        {
            *celsius = value;
        }
        self.reading_of(*celsius)
    }
}
