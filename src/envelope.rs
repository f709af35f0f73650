//! The uniform result every state call returns.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::diff::changes;
use crate::error::{ErrorKind, ReconcileError};
use crate::types::ResourceState;

/// Outcome of a `present` or `absent` call.
///
/// Serializes as `{name, result, comment, old_state, new_state, changes}`
/// plus `error_kind` when the call failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// The resource name the call was made for.
    pub name: String,
    outcome: Result<(), ErrorKind>,
    /// Human-readable messages, in the order they were produced.
    pub comment: Vec<String>,
    /// State before the call, if the resource existed.
    pub old_state: Option<ResourceState>,
    /// State after the call (or the simulated state in dry-run mode).
    pub new_state: Option<ResourceState>,
}

impl Envelope {
    /// A successful envelope with no comments or states.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Ok(()),
            comment: Vec::new(),
            old_state: None,
            new_state: None,
        }
    }

    /// A failed envelope carrying the error's message as its only comment.
    pub fn from_error(name: impl Into<String>, err: &ReconcileError) -> Self {
        let mut envelope = Self::new(name);
        envelope.fail_with(err);
        envelope
    }

    /// Whether the call succeeded.
    pub fn result(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The tagged outcome.
    pub fn outcome(&self) -> Result<(), ErrorKind> {
        self.outcome
    }

    /// The failure kind, if the call failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.outcome.err()
    }

    /// Mark the call as failed.
    pub fn fail(&mut self, kind: ErrorKind) {
        self.outcome = Err(kind);
    }

    /// Mark the call as failed because of `err` and record its message.
    pub fn fail_with(&mut self, err: &ReconcileError) {
        self.fail(err.kind());
        self.comment.push(err.to_string());
    }

    /// Append a comment.
    pub fn push_comment(&mut self, comment: impl Into<String>) {
        self.comment.push(comment.into());
    }

    /// Builder form of [`push_comment`](Self::push_comment).
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.push_comment(comment);
        self
    }

    /// Set the old state.
    pub fn with_old_state(mut self, state: Option<ResourceState>) -> Self {
        self.old_state = state;
        self
    }

    /// Set the new state.
    pub fn with_new_state(mut self, state: Option<ResourceState>) -> Self {
        self.new_state = state;
        self
    }

    /// Top-level keys that differ between old and new state, as `{old, new}`.
    pub fn changes(&self) -> Option<Value> {
        changes(self.old_state.as_ref(), self.new_state.as_ref())
    }

    /// Whether any comment contains `needle`.
    pub fn has_comment(&self, needle: &str) -> bool {
        self.comment.iter().any(|c| c.contains(needle))
    }

    /// The JSON form handed back to the engine.
    pub fn to_value(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(error = %err, name = %self.name, "failed to serialize envelope");
                Value::Null
            },
        }
    }
}

#[derive(Serialize)]
struct EnvelopeRepr<'a> {
    name: &'a str,
    result: bool,
    comment: &'a [String],
    old_state: Option<&'a ResourceState>,
    new_state: Option<&'a ResourceState>,
    changes: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EnvelopeRepr {
            name: &self.name,
            result: self.result(),
            comment: &self.comment,
            old_state: self.old_state.as_ref(),
            new_state: self.new_state.as_ref(),
            changes: self.changes(),
            error_kind: self.error_kind(),
        }
        .serialize(serializer)
    }
}

/// The parameter list of one described resource, keyed by `<type>.present`.
pub type DescribedResource = BTreeMap<String, Vec<Value>>;

/// Output of `describe`: every resource found, keyed by `resource_id`.
pub type Describe = BTreeMap<String, DescribedResource>;
