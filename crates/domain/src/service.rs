//! Service: a callable command exposed by an integration or the core.
//!
//! Examples: `light.turn_on`, `switch.toggle`, `sensor.set_value`.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::id::Identifier;

/// Call parameters passed to a service handler.
pub type ServiceData = Map<String, Value>;

/// Conventional parameter naming the target entity or entities.
pub const ATTR_ENTITY_ID: &str = "entity_id";

/// One invocation of a service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceCall {
    domain: String,
    service: String,
    data: ServiceData,
}

impl ServiceCall {
    /// Build a call; `domain` and `service` are lower-cased.
    #[must_use]
    pub fn new(domain: &str, service: &str, data: ServiceData) -> Self {
        Self {
            domain: domain.to_lowercase(),
            service: service.to_lowercase(),
            data,
        }
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    #[must_use]
    pub fn data(&self) -> &ServiceData {
        &self.data
    }

    /// Target entities named by the `entity_id` parameter, either a single
    /// string or an array of strings. Malformed ids are skipped.
    #[must_use]
    pub fn entity_ids(&self) -> Vec<Identifier> {
        match self.data.get(ATTR_ENTITY_ID) {
            Some(Value::String(raw)) => Identifier::parse(raw).into_iter().collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|raw| Identifier::parse(raw).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for ServiceCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<ServiceCall {}.{}", self.domain, self.service)?;
        if !self.data.is_empty() {
            let fields = self
                .data
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, ": {fields}")?;
        }
        f.write_str(">")
    }
}

/// Introspection record for a registered service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    pub domain: String,
    pub service: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> ServiceData {
        match value {
            Value::Object(map) => map,
            _ => ServiceData::new(),
        }
    }

    #[test]
    fn should_lowercase_domain_and_service() {
        let call = ServiceCall::new("Light", "Turn_On", ServiceData::new());
        assert_eq!(call.domain(), "light");
        assert_eq!(call.service(), "turn_on");
    }

    #[test]
    fn should_extract_single_entity_id() {
        let call = ServiceCall::new(
            "light",
            "turn_on",
            data(json!({"entity_id": "Light.Kitchen"})),
        );
        let ids = call.entity_ids();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].as_str(), "light.kitchen");
    }

    #[test]
    fn should_extract_entity_id_list_and_skip_malformed() {
        let call = ServiceCall::new(
            "light",
            "turn_on",
            data(json!({"entity_id": ["light.a", "broken", 3, "light.b"]})),
        );
        let ids: Vec<_> = call.entity_ids().into_iter().map(String::from).collect();
        assert_eq!(ids, vec!["light.a".to_string(), "light.b".to_string()]);
    }

    #[test]
    fn should_return_no_entity_ids_when_parameter_missing() {
        let call = ServiceCall::new("hub", "restart", ServiceData::new());
        assert!(call.entity_ids().is_empty());
    }

    #[test]
    fn should_display_call_with_parameters() {
        let call = ServiceCall::new("light", "turn_on", data(json!({"brightness": 50})));
        assert_eq!(call.to_string(), "<ServiceCall light.turn_on: brightness=50>");
        let call = ServiceCall::new("light", "turn_off", ServiceData::new());
        assert_eq!(call.to_string(), "<ServiceCall light.turn_off>");
    }
}
