//! Field-map records exchanged with the remote API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One remote entity instance, existing or newly created.
///
/// A record is an open field map rather than a typed struct: the remote API
/// accepts and returns entity-specific supersets of fields, and the
/// reconciliation layer only ever interprets `name` and `id`. Identity for
/// reconciliation is the `name` field; `id` is remote-assigned and appears
/// only after creation (or is synthesized under dry run).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The `name` field, when present and a string.
    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }

    /// The `id` field, when present and a string.
    pub fn id(&self) -> Option<&str> {
        self.get("id").and_then(Value::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Builder-style insert; consumes and returns the record.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Copy restricted to an allowlist, keeping allowlist order and dropping
    /// fields the record does not carry.
    pub fn project(&self, allowlist: &[&str]) -> Record {
        let mut out = Record::new();
        for field in allowlist {
            if let Some(value) = self.fields.get(*field) {
                out.fields.insert((*field).to_string(), value.clone());
            }
        }
        out
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}
