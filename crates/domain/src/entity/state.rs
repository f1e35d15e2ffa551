//! State: the last-known value of one entity.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AttributeValue, Attributes};
use crate::error::ValidationError;
use crate::id::Identifier;
use crate::time::{Timestamp, now};

/// Attribute holding a human-readable name for the entity.
pub const ATTR_FRIENDLY_NAME: &str = "friendly_name";

/// Snapshot of an entity's state.
///
/// `last_changed` moves only when `state` itself changes (or a write is
/// forced); `last_updated` moves on every effective write, including
/// attribute-only ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub entity_id: Identifier,
    pub state: String,
    #[serde(default)]
    pub attributes: Attributes,
    pub last_changed: Timestamp,
    pub last_updated: Timestamp,
}

impl State {
    /// Create a builder for constructing a [`State`].
    #[must_use]
    pub fn builder() -> StateBuilder {
        StateBuilder::default()
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        self.entity_id.domain()
    }

    #[must_use]
    pub fn object_id(&self) -> &str {
        self.entity_id.object_id()
    }

    /// The `friendly_name` attribute, or the object id with underscores
    /// turned into spaces.
    #[must_use]
    pub fn name(&self) -> String {
        self.attributes
            .get(ATTR_FRIENDLY_NAME)
            .and_then(AttributeValue::as_str)
            .map_or_else(|| self.object_id().replace('_', " "), ToString::to_string)
    }

    /// Look up an attribute by key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Compute the successor of this state for a write, or `None` when the
    /// write changes nothing and is not forced.
    #[must_use]
    pub fn apply(
        &self,
        state: String,
        attributes: Attributes,
        force_update: bool,
        at: Timestamp,
    ) -> Option<Self> {
        let same_state = self.state == state;
        if same_state && !force_update && self.attributes == attributes {
            return None;
        }
        let last_changed = if same_state && !force_update {
            self.last_changed
        } else {
            at
        };
        Some(Self {
            entity_id: self.entity_id.clone(),
            state,
            attributes,
            last_changed,
            last_updated: at,
        })
    }

    /// Plain JSON representation, the inverse of [`from_dict`](Self::from_dict).
    #[must_use]
    pub fn to_dict(&self) -> Value {
        serde_json::json!({
            "entity_id": self.entity_id,
            "state": self.state,
            "attributes": self.attributes,
            "last_changed": self.last_changed,
            "last_updated": self.last_updated,
        })
    }

    /// Rebuild a state from its JSON representation.
    ///
    /// Returns `None` for anything that is not an object carrying a valid
    /// `entity_id` and a `state` string. Missing timestamps default to now.
    #[must_use]
    pub fn from_dict(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let entity_id = obj.get("entity_id")?.as_str()?;
        let state = obj.get("state")?.as_str()?;

        let attributes = match obj.get("attributes") {
            None | Some(Value::Null) => Attributes::new(),
            Some(raw) => serde_json::from_value(raw.clone()).ok()?,
        };

        let mut builder = Self::builder()
            .entity_id(entity_id)
            .state(state)
            .attributes(attributes);
        if let Some(raw) = obj.get("last_changed") {
            builder = builder.last_changed(serde_json::from_value(raw.clone()).ok()?);
        }
        if let Some(raw) = obj.get("last_updated") {
            builder = builder.last_updated(serde_json::from_value(raw.clone()).ok()?);
        }
        builder.build().ok()
    }
}

/// Step-by-step builder for [`State`].
#[derive(Debug, Default)]
pub struct StateBuilder {
    entity_id: Option<String>,
    state: Option<String>,
    attributes: Attributes,
    last_changed: Option<Timestamp>,
    last_updated: Option<Timestamp>,
}

impl StateBuilder {
    #[must_use]
    pub fn entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub fn last_changed(mut self, ts: Timestamp) -> Self {
        self.last_changed = Some(ts);
        self
    }

    #[must_use]
    pub fn last_updated(mut self, ts: Timestamp) -> Self {
        self.last_updated = Some(ts);
        self
    }

    /// Consume the builder, validate, and return a [`State`].
    ///
    /// `last_changed` defaults to now and `last_updated` to `last_changed`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidIdentifierFormat`] when the entity
    /// id is missing or malformed.
    pub fn build(self) -> Result<State, ValidationError> {
        let entity_id = Identifier::parse(self.entity_id.as_deref().unwrap_or_default())?;
        let last_changed = self.last_changed.unwrap_or_else(now);
        Ok(State {
            entity_id,
            state: self.state.unwrap_or_default(),
            attributes: self.attributes,
            last_changed,
            last_updated: self.last_updated.unwrap_or(last_changed),
        })
    }
}
