//! Per-topic presence state: snapshots, diffs, and the tracker owning them.
//!
//! A [`PresenceState`] maps a participant identity to the ordered metas of
//! its concurrent sessions. It is only ever replaced by a full snapshot
//! (`presence_state`) or merged with a [`PresenceDiff`] (`presence_diff`).
//! After each apply the tracker hands back the whole resulting state, so the
//! host never observes a partial update.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;

use super::Topic;
use crate::error::MuxError;

/// Meta key used by Phoenix to identify one presence session.
const PHX_REF: &str = "phx_ref";

/// Identity → metas mapping for one topic.
///
/// Serializes as the host-facing `{identity: [metas]}` shape; the wire shape
/// is read with [`PresenceState::from_wire`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PresenceState(BTreeMap<String, Vec<Value>>);

impl PresenceState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the wire shape `{identity: {"metas": [..]}}`.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::MalformedFrame`] if the payload is not an object
    /// or an entry lacks a `metas` array.
    pub fn from_wire(payload: &Value) -> Result<Self, MuxError> {
        let Some(entries) = payload.as_object() else {
            return Err(MuxError::MalformedFrame(
                "presence payload is not an object".to_string(),
            ));
        };
        let mut state = BTreeMap::new();
        for (identity, entry) in entries {
            let Some(metas) = entry.get("metas").and_then(Value::as_array) else {
                return Err(MuxError::MalformedFrame(format!(
                    "presence entry {identity} has no metas"
                )));
            };
            state.insert(identity.clone(), metas.clone());
        }
        Ok(Self(state))
    }

    /// Inserts or replaces an identity's metas.
    pub fn insert(&mut self, identity: impl Into<String>, metas: Vec<Value>) {
        self.0.insert(identity.into(), metas);
    }

    /// Returns the metas recorded for `identity`.
    #[must_use]
    pub fn metas(&self, identity: &str) -> Option<&[Value]> {
        self.0.get(identity).map(Vec::as_slice)
    }

    /// Iterates identities in sorted order.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the number of identities present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nobody is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges `diff` into this state, leaves first, then joins.
    ///
    /// Listed leave metas are removed from the identity (the identity is
    /// dropped once no metas remain). Listed join metas replace any current
    /// meta of the same session and are appended after the remaining ones
    /// (the identity is created if absent).
    pub fn apply_diff(&mut self, diff: PresenceDiff) {
        for (identity, left) in diff.leaves.0 {
            let Some(current) = self.0.get_mut(&identity) else {
                continue;
            };
            current.retain(|meta| !left.iter().any(|gone| same_session(meta, gone)));
            if current.is_empty() {
                self.0.remove(&identity);
            }
        }
        for (identity, joined) in diff.joins.0 {
            let current = self.0.entry(identity).or_default();
            current.retain(|meta| !joined.iter().any(|new| same_session(meta, new)));
            current.extend(joined);
        }
    }
}

/// Incremental presence change for one topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PresenceDiff {
    /// Sessions that appeared, per identity.
    pub joins: PresenceState,
    /// Sessions that disappeared, per identity.
    pub leaves: PresenceState,
}

impl PresenceDiff {
    /// Parses the wire shape `{"joins": {..}, "leaves": {..}}`.
    ///
    /// A missing side is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::MalformedFrame`] if either side is malformed.
    pub fn from_wire(payload: &Value) -> Result<Self, MuxError> {
        let side = |key: &str| match payload.get(key) {
            Some(value) => PresenceState::from_wire(value),
            None => Ok(PresenceState::new()),
        };
        Ok(Self {
            joins: side("joins")?,
            leaves: side("leaves")?,
        })
    }
}

/// Two metas describe the same session if their `phx_ref`s match, or, when
/// either lacks one, if they are equal as JSON.
fn same_session(a: &Value, b: &Value) -> bool {
    match (a.get(PHX_REF), b.get(PHX_REF)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Owner of every topic's [`PresenceState`].
///
/// A topic's state exists exactly while its subscription does: it is
/// created empty by [`PresenceTracker::track`] and dropped by
/// [`PresenceTracker::untrack`] or [`PresenceTracker::clear`].
#[derive(Debug, Default)]
pub struct PresenceTracker {
    states: HashMap<Topic, PresenceState>,
}

impl PresenceTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `topic` with an empty state.
    pub fn track(&mut self, topic: Topic) {
        self.states.entry(topic).or_default();
    }

    /// Stops tracking `topic`, discarding its state.
    pub fn untrack(&mut self, topic: &Topic) -> Option<PresenceState> {
        self.states.remove(topic)
    }

    /// Replaces the topic's state wholesale and returns the result.
    ///
    /// Returns `None` if the topic is not tracked.
    pub fn apply_state(&mut self, topic: &Topic, snapshot: PresenceState) -> Option<&PresenceState> {
        let state = self.states.get_mut(topic)?;
        *state = snapshot;
        Some(state)
    }

    /// Merges `diff` into the topic's state and returns the result.
    ///
    /// Returns `None` if the topic is not tracked.
    pub fn apply_diff(&mut self, topic: &Topic, diff: PresenceDiff) -> Option<&PresenceState> {
        let state = self.states.get_mut(topic)?;
        state.apply_diff(diff);
        Some(state)
    }

    /// Returns the topic's current state.
    #[must_use]
    pub fn get(&self, topic: &Topic) -> Option<&PresenceState> {
        self.states.get(topic)
    }

    /// Returns the number of tracked topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if no topic is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drops every topic's state.
    pub fn clear(&mut self) {
        self.states.clear();
    }
}
