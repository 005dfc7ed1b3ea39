//! Event emission for observability.
//!
//! The orchestrator and navigation controller report every stage run and
//! every move through an [`EventSink`]. Payloads are JSON objects that always
//! carry the session id and an ISO-8601 timestamp.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::utils::iso_timestamp;
use serde_json::{json, Value};
use uuid::Uuid;

/// A generation call was dispatched.
pub const STAGE_STARTED: &str = "stage.started";
/// A generation result was written to the store.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// A generation call failed; the store is unchanged.
pub const STAGE_FAILED: &str = "stage.failed";
/// A run was refused because the same stage is in flight.
pub const STAGE_BUSY: &str = "stage.busy";
/// The current position changed.
pub const NAVIGATION_MOVED: &str = "navigation.moved";
/// A navigation target was not reachable.
pub const NAVIGATION_LOCKED: &str = "navigation.locked";

/// Builds an event payload, merging `fields` into the common envelope.
#[must_use]
pub fn payload(session_id: Uuid, fields: Value) -> Value {
    let mut envelope = json!({
        "session_id": session_id.to_string(),
        "timestamp": iso_timestamp(),
    });
    if let (Some(target), Value::Object(extra)) = (envelope.as_object_mut(), fields) {
        target.extend(extra);
    }
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_merges_fields() {
        let id = Uuid::new_v4();
        let value = payload(id, json!({"stage": "concept_generation"}));
        assert_eq!(value["session_id"], id.to_string());
        assert_eq!(value["stage"], "concept_generation");
        assert!(value["timestamp"].as_str().is_some_and(|t| t.contains('T')));
    }
}
