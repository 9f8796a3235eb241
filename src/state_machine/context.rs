//! Per-session workflow context

use super::state::WorkflowState;
use super::transition::Transition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Collected workflow data, keyed by field name
pub type Fields = BTreeMap<String, Value>;

/// One recorded state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub trigger: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// Data a session has gathered plus how it got to its current state.
///
/// Callers only ever see snapshots; the live copy is changed by the engine's
/// transition operation so that every state change has a history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    session_id: String,
    patient_id: Option<String>,
    current_state: WorkflowState,
    fields: Fields,
    history: Vec<HistoryEntry>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkflowContext {
    pub(crate) fn new(
        session_id: impl Into<String>,
        patient_id: Option<String>,
        initial_state: WorkflowState,
        fields: Fields,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            patient_id,
            current_state: initial_state,
            fields: fields.into_iter().filter(|(_, v)| !v.is_null()).collect(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn patient_id(&self) -> Option<&str> {
        self.patient_id.as_deref()
    }

    pub fn current_state(&self) -> WorkflowState {
        self.current_state
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// True when the field exists and carries something
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(is_present)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn field_bool(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(Value::as_bool)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Required fields that are absent or empty
    pub fn missing_fields<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|name| !self.has_field(name))
            .collect()
    }

    /// Merge updates, move along `edge` and record it.
    ///
    /// A `null` update clears the field.
    pub(crate) fn apply(
        &mut self,
        edge: &Transition,
        updates: Fields,
        now: DateTime<Utc>,
    ) -> &HistoryEntry {
        for (name, value) in updates {
            if value.is_null() {
                self.fields.remove(&name);
            } else {
                self.fields.insert(name, value);
            }
        }

        self.history.push(HistoryEntry {
            from: self.current_state,
            to: edge.to,
            trigger: edge.trigger.to_string(),
            timestamp: now,
            description: edge.description.to_string(),
        });
        self.current_state = edge.to;
        self.updated_at = now;

        &self.history[self.history.len() - 1]
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Build a field map from literal pairs
///
/// ```
/// use refill_workflow::fields;
/// let f = fields! { "medication_name" => "lisinopril", "quantity" => 30 };
/// assert_eq!(f.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    () => { $crate::state_machine::Fields::new() };
    ($($name:expr => $value:tt),+ $(,)?) => {{
        let mut fields = $crate::state_machine::Fields::new();
        $(fields.insert(::std::string::String::from($name), ::serde_json::json!($value));)+
        fields
    }};
}
