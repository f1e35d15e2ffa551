//! Event: an immutable record of something that happened.
//!
//! Events are produced when states change, services are registered or
//! called, the timer ticks, and the hub starts or stops. Integrations may
//! fire their own event types with free-form [`EventData::Fields`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::State;
use crate::id::Identifier;
use crate::time::{Timestamp, now};

/// Listening to this event type receives every event.
pub const MATCH_ALL: &str = "*";

pub const EVENT_HUB_START: &str = "hub_start";
pub const EVENT_HUB_STOP: &str = "hub_stop";
pub const EVENT_STATE_CHANGED: &str = "state_changed";
pub const EVENT_TIME_CHANGED: &str = "time_changed";
pub const EVENT_CALL_SERVICE: &str = "call_service";
pub const EVENT_SERVICE_EXECUTED: &str = "service_executed";
pub const EVENT_SERVICE_REGISTERED: &str = "service_registered";

/// Where an event was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Origin {
    /// Fired inside this process.
    #[default]
    Local,
    /// Received from elsewhere and re-fired locally.
    Remote,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("LOCAL"),
            Self::Remote => f.write_str("REMOTE"),
        }
    }
}

/// Payload of a `state_changed` event.
///
/// `old_state` is `None` the first time an entity is seen, `new_state` is
/// `None` once it has been removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChangedData {
    pub entity_id: Identifier,
    pub old_state: Option<State>,
    pub new_state: Option<State>,
}

/// Event payload. Opaque to the bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    StateChanged(StateChangedData),
    Fields(Map<String, Value>),
}

impl EventData {
    /// An empty field map.
    #[must_use]
    pub fn empty() -> Self {
        Self::Fields(Map::new())
    }

    #[must_use]
    pub fn as_state_changed(&self) -> Option<&StateChangedData> {
        match self {
            Self::StateChanged(data) => Some(data),
            Self::Fields(_) => None,
        }
    }

    /// Look up a field of a free-form payload.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Fields(map) => map.get(key),
            Self::StateChanged(_) => None,
        }
    }
}

impl Default for EventData {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<StateChangedData> for EventData {
    fn from(data: StateChangedData) -> Self {
        Self::StateChanged(data)
    }
}

impl From<Map<String, Value>> for EventData {
    fn from(map: Map<String, Value>) -> Self {
        Self::Fields(map)
    }
}

/// Objects become fields, `null` becomes an empty payload, any other value
/// is stored under `"value"`.
impl From<Value> for EventData {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Fields(map),
            Value::Null => Self::empty(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Self::Fields(map)
            }
        }
    }
}

/// Something that happened, as delivered to listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    event_type: String,
    data: EventData,
    origin: Origin,
    time_fired: Timestamp,
}

impl Event {
    /// A local event fired now.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: impl Into<EventData>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
            origin: Origin::Local,
            time_fired: now(),
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    #[must_use]
    pub fn with_time_fired(mut self, time_fired: Timestamp) -> Self {
        self.time_fired = time_fired;
        self
    }

    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    #[must_use]
    pub fn data(&self) -> &EventData {
        &self.data
    }

    #[must_use]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    #[must_use]
    pub fn time_fired(&self) -> Timestamp {
        self.time_fired
    }

    /// Shortcut for `state_changed` payloads.
    #[must_use]
    pub fn state_change(&self) -> Option<&StateChangedData> {
        self.data.as_state_changed()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.origin {
            Origin::Local => 'L',
            Origin::Remote => 'R',
        };
        match &self.data {
            EventData::StateChanged(data) => {
                write!(f, "<Event {}[{tag}]: {}>", self.event_type, data.entity_id)
            }
            EventData::Fields(map) if map.is_empty() => {
                write!(f, "<Event {}[{tag}]>", self.event_type)
            }
            EventData::Fields(map) => {
                let fields = map
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "<Event {}[{tag}]: {fields}>", self.event_type)
            }
        }
    }
}
