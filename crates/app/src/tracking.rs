//! Listener helpers for common reactions: an entity changing state, or a
//! point in time being reached.

use std::collections::HashSet;
use std::sync::Arc;

use homecore_domain::event::{EVENT_STATE_CHANGED, EVENT_TIME_CHANGED, StateChangedData};
use homecore_domain::id::Identifier;
use homecore_domain::time::Timestamp;
use parking_lot::Mutex;

use crate::event_bus::{EventBus, Subscription};

/// Run `action` whenever one of `entity_ids` changes.
///
/// An empty `entity_ids` matches every entity. `from_state`/`to_state`
/// restrict the old/new `state` value; `None` matches anything, including a
/// missing old or new state.
pub fn track_state_change(
    bus: &EventBus,
    entity_ids: impl IntoIterator<Item = Identifier>,
    from_state: Option<&str>,
    to_state: Option<&str>,
    action: impl Fn(&StateChangedData) + Send + Sync + 'static,
) -> Subscription {
    let entity_ids: HashSet<Identifier> = entity_ids.into_iter().collect();
    let from_state = from_state.map(ToString::to_string);
    let to_state = to_state.map(ToString::to_string);

    bus.listen(EVENT_STATE_CHANGED, move |event| {
        let Some(change) = event.state_change() else {
            return;
        };
        if !entity_ids.is_empty() && !entity_ids.contains(&change.entity_id) {
            return;
        }
        let old = change.old_state.as_ref().map(|s| s.state.as_str());
        let new = change.new_state.as_ref().map(|s| s.state.as_str());
        if matches(from_state.as_deref(), old) && matches(to_state.as_deref(), new) {
            action(change);
        }
    })
}

fn matches(expected: Option<&str>, actual: Option<&str>) -> bool {
    expected.is_none_or(|expected| actual == Some(expected))
}

/// Run `action` once, on the first `time_changed` event fired at or after
/// `when`. The listener removes itself afterwards.
pub fn track_point_in_time<F>(bus: &EventBus, when: Timestamp, action: F) -> Subscription
where
    F: FnOnce(Timestamp) + Send + 'static,
{
    let pending: Arc<Mutex<PointInTime<F>>> = Arc::new(Mutex::new(PointInTime {
        action: Some(action),
        subscription: None,
    }));
    let listener_state = Arc::clone(&pending);

    let subscription = bus.listen(EVENT_TIME_CHANGED, move |event| {
        let fired_at = event.time_fired();
        if fired_at < when {
            return;
        }
        let (action, subscription) = {
            let mut state = listener_state.lock();
            (state.action.take(), state.subscription.take())
        };
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        if let Some(action) = action {
            action(fired_at);
        }
    });

    let mut state = pending.lock();
    if state.action.is_some() {
        state.subscription = Some(subscription.clone());
    } else {
        // Already fired on another thread before the handle was stored.
        subscription.unsubscribe();
    }
    subscription
}

struct PointInTime<F> {
    action: Option<F>,
    subscription: Option<Subscription>,
}
