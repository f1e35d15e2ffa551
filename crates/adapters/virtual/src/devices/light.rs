//! Virtual light: responds to `turn_on`, `turn_off`, `toggle`.

use homecore_domain::entity::{ATTR_FRIENDLY_NAME, AttributeValue, Attributes};
use homecore_domain::service::ServiceCall;
use parking_lot::Mutex;

use super::Reading;

pub const ATTR_BRIGHTNESS: &str = "brightness";
const FULL_BRIGHTNESS: i64 = 255;

#[derive(Debug, Clone, Copy)]
struct LightState {
    on: bool,
    brightness: i64,
}

/// A simulated dimmable light.
pub struct VirtualLight {
    name: String,
    state: Mutex<LightState>,
}

impl VirtualLight {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(LightState {
                on: false,
                brightness: FULL_BRIGHTNESS,
            }),
        }
    }

    /// Current reading; brightness is only reported while on.
    #[must_use]
    pub fn reading(&self) -> Reading {
        self.reading_of(*self.state.lock())
    }

    fn reading_of(&self, state: LightState) -> Reading {
        let mut attributes = Attributes::new();
        attributes.insert(ATTR_FRIENDLY_NAME.to_string(), self.name.clone().into());
        if state.on {
            attributes.insert(
                ATTR_BRIGHTNESS.to_string(),
                AttributeValue::Int(state.brightness),
            );
        }
        Reading {
            state: if state.on { "on" } else { "off" }.to_string(),
            attributes,
        }
    }

    /// Apply a service call. `turn_on` accepts an optional `brightness`
    /// (clamped to 0–255). Unknown services leave the light untouched.
    pub fn handle_service(&self, call: &ServiceCall) -> Reading {
        let mut state = self.state.lock();
        match call.service() {
            "turn_on" => {
                state.on = true;
                if let Some(brightness) = call
                    .data()
                    .get(ATTR_BRIGHTNESS)
                    .and_then(serde_json::Value::as_i64)
                {
                    state.brightness = brightness.clamp(0, FULL_BRIGHTNESS);
                }
            }
            "turn_off" => state.on = false,
            "toggle" => state.on = !state.on,
            _ => {}
        }
        self.reading_of(*state)
    }
}
