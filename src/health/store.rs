//! Live sensor state storage.
//!
//! [`StateStore`] is the read side the merge sensors use to snapshot their
//! children. [`StateHub`] is the in-process implementation: input sources
//! write into it and it notifies subscribers of every change.

use super::notifier::{ChangeCallback, ChangeNotifier, LocalNotifier, SubscriptionHandle};
use super::reading::ChildReading;
use super::severity::{ChildState, STATE_UNAVAILABLE};
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Attribute key holding a sensor's status explanation.
pub const ATTR_STATUS: &str = "status";

/// State of a sensor as held by the host.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawState {
    /// Severity literal (`"warn"`, `"unavailable"`, ...).
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl RawState {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            attributes: Map::new(),
        }
    }

    pub fn unavailable() -> Self {
        Self::new(STATE_UNAVAILABLE)
    }

    /// Set the status attribute.
    pub fn with_status(mut self, text: impl Into<String>) -> Self {
        self.attributes
            .insert(ATTR_STATUS.to_string(), Value::String(text.into()));
        self
    }

    /// Status attribute as text.
    ///
    /// Strings are returned as-is, numbers and booleans as their JSON text.
    /// Null, arrays and objects count as absent.
    pub fn status_text(&self) -> Option<String> {
        match self.attributes.get(ATTR_STATUS)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Convert to a reading for the child `id`.
    pub fn to_reading(&self, id: &str) -> ChildReading {
        ChildReading {
            id: id.to_string(),
            state: ChildState::parse(&self.state),
            status_text: self.status_text(),
        }
    }
}

/// Read access to live sensor states.
pub trait StateStore: Send + Sync {
    /// Current state of `id`, or `None` if unknown.
    fn get(&self, id: &str) -> Option<RawState>;

    /// Reading for `id`; a missing state becomes an unavailable reading.
    fn reading(&self, id: &str) -> ChildReading {
        match self.get(id) {
            Some(raw) => raw.to_reading(id),
            None => ChildReading::unavailable(id),
        }
    }
}

/// In-memory state store that notifies subscribers on change.
#[derive(Default)]
pub struct StateHub {
    states: RwLock<HashMap<String, RawState>>,
    notifier: LocalNotifier,
}

impl StateHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the state of `id`.
    ///
    /// Subscribers are notified only if the stored state changed.
    /// Returns whether it changed.
    pub fn set(&self, id: &str, state: RawState) -> bool {
        let changed = {
            let mut states = self.states.write();
            if states.get(id) == Some(&state) {
                false
            } else {
                states.insert(id.to_string(), state);
                true
            }
        };

        if changed {
            let notified = self.notifier.notify(id);
            debug!("State of {} changed, notified {} subscriber(s)", id, notified);
        }
        changed
    }

    pub fn mark_unavailable(&self, id: &str) -> bool {
        self.set(id, RawState::unavailable())
    }

    /// Forget the state of `id`. Subscribers are notified if it was known.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.states.write().remove(id).is_some();
        if removed {
            self.notifier.notify(id);
        }
        removed
    }

    /// Ids currently held, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.states.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn subscription_count(&self) -> usize {
        self.notifier.subscription_count()
    }
}

impl StateStore for StateHub {
    fn get(&self, id: &str) -> Option<RawState> {
        self.states.read().get(id).cloned()
    }
}

impl ChangeNotifier for StateHub {
    fn subscribe(&self, ids: &[String], on_change: ChangeCallback) -> SubscriptionHandle {
        self.notifier.subscribe(ids, on_change)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.notifier.unsubscribe(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::severity::SeverityLevel;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_missing_state_reads_unavailable() {
        let hub = StateHub::new();
        assert_eq!(hub.get("sensor.disk"), None);
        assert_eq!(
            hub.reading("sensor.disk"),
            ChildReading::unavailable("sensor.disk")
        );
    }

    #[test]
    fn test_reading_carries_status() {
        let hub = StateHub::new();
        hub.set("sensor.disk", RawState::new("bad").with_status("disk full"));

        let reading = hub.reading("sensor.disk");
        assert_eq!(reading.state, ChildState::Level(SeverityLevel::Bad));
        assert_eq!(reading.status_text.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_status_attribute_types() {
        let mut raw = RawState::new("warn");
        raw.attributes.insert(ATTR_STATUS.to_string(), json!(42));
        assert_eq!(raw.status_text().as_deref(), Some("42"));

        raw.attributes.insert(ATTR_STATUS.to_string(), json!(null));
        assert_eq!(raw.status_text(), None);

        raw.attributes.insert(ATTR_STATUS.to_string(), json!(["a", "b"]));
        assert_eq!(raw.status_text(), None);
    }

    #[test]
    fn test_set_notifies_only_on_change() {
        let hub = StateHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        hub.subscribe(
            &["sensor.disk".to_string()],
            Arc::new(move |_id: &str| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(hub.set("sensor.disk", RawState::new("good")));
        assert!(!hub.set("sensor.disk", RawState::new("good")));
        assert!(hub.set("sensor.disk", RawState::new("good").with_status("ok")));
        assert!(hub.mark_unavailable("sensor.disk"));
        assert!(hub.remove("sensor.disk"));
        assert!(!hub.remove("sensor.disk"));

        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_raw_state_deserializes_without_attributes() {
        let raw: RawState = serde_json::from_str(r#"{"state":"warn"}"#).unwrap();
        assert_eq!(raw, RawState::new("warn"));
    }

    #[test]
    fn test_ids_lists_stored_children() {
        let hub = StateHub::new();
        assert!(hub.ids().is_empty());

        hub.set("sensor.fan", RawState::new("good"));
        hub.set("sensor.disk", RawState::new("warn"));
        hub.mark_unavailable("sensor.psu");
        assert_eq!(hub.ids(), vec!["sensor.disk", "sensor.fan", "sensor.psu"]);

        hub.remove("sensor.fan");
        assert_eq!(hub.ids(), vec!["sensor.disk", "sensor.psu"]);
    }
}
