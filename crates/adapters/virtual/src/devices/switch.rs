//! Virtual switch: responds to `turn_on`, `turn_off`, `toggle`.

use std::sync::atomic::{AtomicBool, Ordering};

use homecore_domain::entity::{ATTR_FRIENDLY_NAME, Attributes};
use homecore_domain::service::ServiceCall;

use super::Reading;

/// A simulated on/off switch.
pub struct VirtualSwitch {
    name: String,
    on: AtomicBool,
}

impl VirtualSwitch {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn reading(&self) -> Reading {
        self.reading_of(self.on.load(Ordering::SeqCst))
    }

    fn reading_of(&self, on: bool) -> Reading {
        let mut attributes = Attributes::new();
        attributes.insert(ATTR_FRIENDLY_NAME.to_string(), self.name.clone().into());
        Reading {
            state: if on { "on" } else { "off" }.to_string(),
            attributes,
        }
    }

    /// Apply a service call and report the value it produced.
    pub fn handle_service(&self, call: &ServiceCall) -> Reading {
        let on = match call.service() {
            "turn_on" => {
                self.on.store(true, Ordering::SeqCst);
                true
            }
            "turn_off" => {
                self.on.store(false, Ordering::SeqCst);
                false
            }
            "toggle" => !self.on.fetch_xor(true, Ordering::SeqCst),
            _ => self.on.load(Ordering::SeqCst),
        };
        self.reading_of(on)
    }
}
