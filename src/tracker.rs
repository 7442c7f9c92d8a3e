//! Change detection for auto-sync: compares a candidate state snapshot
//! against the last-saved serialized form.
//!
//! The comparison uses a canonical serialization (objects re-keyed in sorted
//! order) so structurally equal values compare equal regardless of field
//! order. The tracker is a read-only comparator: callers record the snapshot
//! themselves after a successful save.

use serde_json::Value;
use tracing::debug;

/// Tracks the last-saved snapshot and answers "has the state changed?".
#[derive(Debug, Default)]
pub struct ChangeTracker {
    last_snapshot: Option<String>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tracker with a previously persisted serialized snapshot.
    pub fn with_snapshot(snapshot: String) -> Self {
        Self {
            last_snapshot: Some(snapshot),
        }
    }

    /// Returns `true` when the candidate differs from the last recorded
    /// snapshot. The first call (no prior snapshot) always returns `true`.
    /// No side effects: call [`ChangeTracker::record`] after a successful save.
    pub fn has_changed<T: serde::Serialize>(&self, candidate: &T) -> bool {
        let serialized = match canonical_json(candidate) {
            Ok(s) => s,
            Err(e) => {
                // Unserializable state is treated as changed so a save is attempted.
                debug!(error = ?e, "Failed to serialize candidate state, treating as changed");
                return true;
            }
        };
        match &self.last_snapshot {
            Some(last) => *last != serialized,
            None => true,
        }
    }

    /// Record the candidate as the new last-saved snapshot.
    pub fn record<T: serde::Serialize>(&mut self, candidate: &T) {
        if let Ok(serialized) = canonical_json(candidate) {
            self.last_snapshot = Some(serialized);
        }
    }

    /// The serialized form of the last recorded snapshot, if any.
    pub fn last_snapshot(&self) -> Option<&str> {
        self.last_snapshot.as_deref()
    }
}

/// Serializes a value to JSON with all object keys sorted, at every depth.
pub fn canonical_json<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    serde_json::to_string(&sort_keys(value))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            // BTreeMap gives the stable key order
            let sorted: std::collections::BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, sort_keys(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
