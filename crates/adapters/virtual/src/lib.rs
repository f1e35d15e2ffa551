//! # homecore-adapter-virtual
//!
//! Virtual/demo integration that provides simulated devices for testing and
//! demonstration purposes.
//!
//! ## Provided devices
//!
//! | Device | Entity ID | Services |
//! |--------|-----------|----------|
//! | Virtual Light | `light.virtual_light` | `light.turn_on` (optional `brightness`), `light.turn_off`, `light.toggle` |
//! | Virtual Sensor | `sensor.virtual_temperature` | `sensor.set_value` (`value` in °C) |
//! | Virtual Switch | `switch.virtual_switch` | `switch.turn_on`, `switch.turn_off`, `switch.toggle` |
//!
//! A call without `entity_id` targets every virtual entity of the domain.
//!
//! ## Dependency rule
//!
//! Depends on `homecore-app` (the `Integration` port and hub components) and
//! `homecore-domain` only.

mod devices;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use homecore_app::hub::Hub;
use homecore_app::ports::Integration;
use homecore_app::state_store::StateStore;
use homecore_domain::error::HubError;
use homecore_domain::id::Identifier;
use homecore_domain::service::ServiceCall;

pub use devices::{
    ATTR_BRIGHTNESS, ATTR_UNIT_OF_MEASUREMENT, Reading, VirtualDevice, VirtualLight, VirtualSensor,
    VirtualSwitch,
};

pub const LIGHT_ID: &str = "light.virtual_light";
pub const SENSOR_ID: &str = "sensor.virtual_temperature";
pub const SWITCH_ID: &str = "switch.virtual_switch";

type Devices = BTreeMap<Identifier, VirtualDevice>;

/// Virtual integration that creates simulated devices.
#[derive(Default)]
pub struct VirtualIntegration {
    devices: Arc<Devices>,
    states: Option<Arc<StateStore>>,
}

impl VirtualIntegration {
    /// Check whether this integration owns the given entity.
    #[must_use]
    pub fn owns_entity(&self, entity_id: &Identifier) -> bool {
        self.devices.contains_key(entity_id)
    }

    fn build_devices(hub: &Hub) -> Result<Devices, HubError> {
        let mut devices = Devices::new();
        devices.insert(
            Identifier::parse(LIGHT_ID)?,
            VirtualDevice::Light(VirtualLight::new("Virtual Light")),
        );
        devices.insert(
            Identifier::parse(SENSOR_ID)?,
            VirtualDevice::Sensor(VirtualSensor::new(
                "Virtual Temperature",
                Arc::clone(hub.config()),
            )),
        );
        devices.insert(
            Identifier::parse(SWITCH_ID)?,
            VirtualDevice::Switch(VirtualSwitch::new("Virtual Switch")),
        );
        Ok(devices)
    }
}

/// Route a service call to the targeted devices and report their new
/// readings.
fn dispatch(devices: &Devices, states: &StateStore, call: &ServiceCall) {
    let mut targets = call.entity_ids();
    if targets.is_empty() {
        targets = devices
            .keys()
            .filter(|id| id.domain() == call.domain())
            .cloned()
            .collect();
    }

    for entity_id in targets {
        let Some(device) = devices
            .get(&entity_id)
            .filter(|_| entity_id.domain() == call.domain())
        else {
            tracing::debug!(%entity_id, %call, "not a virtual entity, skipping");
            continue;
        };
        let reading = device.handle_service(call);
        states.set(&entity_id, reading.state, reading.attributes, false);
    }
}

impl Integration for VirtualIntegration {
    fn name(&self) -> &'static str {
        "virtual"
    }

    fn setup(&mut self, hub: &Hub) -> Result<(), HubError> {
        let devices = Arc::new(Self::build_devices(hub)?);
        let states = Arc::clone(hub.states());

        for (entity_id, device) in devices.iter() {
            let reading = device.reading();
            states.set(entity_id, reading.state, reading.attributes, false);
        }

        let services: BTreeSet<(String, &'static str)> = devices
            .iter()
            .flat_map(|(id, device)| {
                device
                    .services()
                    .iter()
                    .map(move |service| (id.domain().to_string(), *service))
            })
            .collect();
        for (domain, service) in services {
            let devices = Arc::clone(&devices);
            let states = Arc::clone(&states);
            hub.services()
                .register(&domain, service, move |call| dispatch(&devices, &states, call));
        }

        tracing::info!(entities = devices.len(), "virtual integration ready");
        self.devices = devices;
        self.states = Some(states);
        Ok(())
    }

    fn teardown(&mut self) -> Result<(), HubError> {
        if let Some(states) = self.states.take() {
            for entity_id in self.devices.keys() {
                states.remove(entity_id);
            }
        }
        tracing::debug!("virtual integration torn down");
        Ok(())
    }
}
