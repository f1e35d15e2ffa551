//! Virtual device implementations: light, sensor, switch.
//!
//! Each device keeps its own simulated hardware state and turns a service
//! call into a [`Reading`] the integration reports to the State Store.

mod light;
mod sensor;
mod switch;

pub use light::{ATTR_BRIGHTNESS, VirtualLight};
pub use sensor::{ATTR_UNIT_OF_MEASUREMENT, VirtualSensor};
pub use switch::VirtualSwitch;

use homecore_domain::entity::Attributes;
use homecore_domain::service::ServiceCall;

/// State string and attributes produced by a device.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub state: String,
    pub attributes: Attributes,
}

/// Wrapper enum for the concrete virtual device types.
pub enum VirtualDevice {
    Light(VirtualLight),
    Sensor(VirtualSensor),
    Switch(VirtualSwitch),
}

impl VirtualDevice {
    /// Services this kind of device answers to, registered under its domain.
    #[must_use]
    pub fn services(&self) -> &'static [&'static str] {
        match self {
            Self::Light(_) | Self::Switch(_) => &["turn_on", "turn_off", "toggle"],
            Self::Sensor(_) => &["set_value"],
        }
    }

    #[must_use]
    pub fn reading(&self) -> Reading {
        match self {
            Self::Light(d) => d.reading(),
            Self::Sensor(d) => d.reading(),
            Self::Switch(d) => d.reading(),
        }
    }

    /// Apply a service call and return the resulting reading.
    pub fn handle_service(&self, call: &ServiceCall) -> Reading {
        match self {
            Self::Light(d) => d.handle_service(call),
            Self::Sensor(d) => d.handle_service(call),
            Self::Switch(d) => d.handle_service(call),
        }
    }
}
