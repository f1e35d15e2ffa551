//! Integration port: lifecycle of the adapters that feed the hub.
//!
//! An integration bridges an external source (virtual, MQTT, Zigbee, …) into
//! the hub. During setup it registers the services it handles and reports
//! the initial state of its entities; afterwards it keeps the State Store up
//! to date and reacts to service calls. It talks to the hub only through
//! the [`Hub`] components, never to another integration directly.

use homecore_domain::error::HubError;

use crate::hub::Hub;

/// A pluggable integration.
///
/// The daemon calls the lifecycle methods in order:
///
/// 1. [`setup`](Self::setup): register services, report initial states,
///    subscribe to events
/// 2. (the hub runs, dispatching service calls to the registered handlers)
/// 3. [`teardown`](Self::teardown): release resources
pub trait Integration {
    /// Unique name identifying this integration (e.g. `"virtual"`).
    fn name(&self) -> &'static str;

    /// Register services and report initial states.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Integration`] when the integration cannot start.
    fn setup(&mut self, hub: &Hub) -> Result<(), HubError>;

    /// Called on graceful shutdown, after the hub has stopped.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Integration`] when cleanup fails.
    fn teardown(&mut self) -> Result<(), HubError> {
        Ok(())
    }
}
