//! State store: the canonical map of entity states.
//!
//! Every effective write fires a `state_changed` event through the
//! [`EventBus`]. The map lock is released before the event is fired, so
//! listeners can read or write the store from inside their callback.

use std::collections::HashMap;
use std::sync::Arc;

use homecore_domain::entity::{AttributeValue, Attributes, State};
use homecore_domain::event::{EVENT_STATE_CHANGED, StateChangedData};
use homecore_domain::id::Identifier;
use homecore_domain::time::now;
use parking_lot::Mutex;

use crate::event_bus::EventBus;

/// Owner of every entity's current [`State`].
pub struct StateStore {
    states: Mutex<HashMap<Identifier, State>>,
    bus: Arc<EventBus>,
}

impl StateStore {
    /// Create an empty store publishing changes on `bus`.
    #[must_use]
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            bus,
        }
    }

    /// Current state of an entity.
    #[must_use]
    pub fn get(&self, entity_id: &Identifier) -> Option<State> {
        self.states.lock().get(entity_id).cloned()
    }

    /// Record a new reading for an entity.
    ///
    /// Writing the same state and attributes again is a no-op unless
    /// `force_update` is set. Attribute-only changes refresh `last_updated`
    /// and keep `last_changed`. Returns whether a `state_changed` event was
    /// fired.
    pub fn set(
        &self,
        entity_id: &Identifier,
        state: impl Into<String>,
        attributes: Attributes,
        force_update: bool,
    ) -> bool {
        let state = state.into();
        let change = {
            let mut states = self.states.lock();
            let at = now();
            let old_state = states.get(entity_id).cloned();
            let new_state = match &old_state {
                Some(previous) => {
                    let Some(next) = previous.apply(state, attributes, force_update, at) else {
                        tracing::trace!(entity_id = %entity_id, "state unchanged, skipping");
                        return false;
                    };
                    next
                }
                None => State {
                    entity_id: entity_id.clone(),
                    state,
                    attributes,
                    last_changed: at,
                    last_updated: at,
                },
            };
            states.insert(entity_id.clone(), new_state.clone());
            StateChangedData {
                entity_id: entity_id.clone(),
                old_state,
                new_state: Some(new_state),
            }
        };

        tracing::debug!(
            entity_id = %change.entity_id,
            state = change.new_state.as_ref().map(|s| s.state.as_str()),
            "state updated"
        );
        self.bus.fire(EVENT_STATE_CHANGED, change);
        true
    }

    /// Forget an entity. Returns `false`, firing nothing, when it is unknown.
    pub fn remove(&self, entity_id: &Identifier) -> bool {
        let Some(old_state) = self.states.lock().remove(entity_id) else {
            return false;
        };

        tracing::debug!(entity_id = %entity_id, "state removed");
        self.bus.fire(
            EVENT_STATE_CHANGED,
            StateChangedData {
                entity_id: entity_id.clone(),
                old_state: Some(old_state),
                new_state: None,
            },
        );
        true
    }

    /// Whether the entity exists and its state equals `expected`.
    #[must_use]
    pub fn is_state(&self, entity_id: &Identifier, expected: &str) -> bool {
        self.states
            .lock()
            .get(entity_id)
            .is_some_and(|s| s.state == expected)
    }

    /// Whether the entity exists and carries attribute `key` equal to
    /// `expected`.
    #[must_use]
    pub fn is_state_attr(
        &self,
        entity_id: &Identifier,
        key: &str,
        expected: impl Into<AttributeValue>,
    ) -> bool {
        let expected = expected.into();
        self.states
            .lock()
            .get(entity_id)
            .and_then(|s| s.attributes.get(key))
            .is_some_and(|value| *value == expected)
    }

    /// Sorted ids of known entities, optionally limited to one domain.
    #[must_use]
    pub fn entity_ids(&self, domain_filter: Option<&str>) -> Vec<Identifier> {
        let domain_filter = domain_filter.map(str::to_lowercase);
        let mut ids: Vec<Identifier> = self
            .states
            .lock()
            .keys()
            .filter(|id| domain_filter.as_deref().is_none_or(|d| id.domain() == d))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Snapshot of every state.
    #[must_use]
    pub fn all(&self) -> Vec<State> {
        self.states.lock().values().cloned().collect()
    }
}
