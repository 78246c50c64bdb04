//! Document model
//!
//! A document is an opaque JSON payload addressed by `(partitionKey, id)`
//! and carrying a version token (`_etag`) that changes on every write.

mod filter;

pub use filter::{FilterCondition, FilterOperator, QueryFilter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document as read from, and written to, a partitioned store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique within a partition
    pub id: String,

    /// Determines physical placement
    #[serde(rename = "partitionKey")]
    pub partition_key: String,

    /// Opaque concurrency token captured at read time
    #[serde(rename = "_etag", default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Remaining fields
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Document {
    /// Create a document with an empty body and no version
    pub fn new(id: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            partition_key: partition_key.into(),
            version: String::new(),
            body: Map::new(),
        }
    }

    /// Builder-style field setter
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.body.insert(key.into(), value);
        self
    }

    /// Look up a field; the three address fields resolve as well
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(Value::String(self.id.clone())),
            "partitionKey" => Some(Value::String(self.partition_key.clone())),
            "_etag" if !self.version.is_empty() => Some(Value::String(self.version.clone())),
            _ => self.body.get(field).cloned(),
        }
    }

    /// String value of a body field, if present and a string
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.body.get(field).and_then(Value::as_str)
    }

    /// Set a body field
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.body.insert(field.into(), value);
    }

    /// Remove a body field, returning its previous value
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.body.remove(field)
    }

    /// Whether the replacement must move to a different partition
    pub fn changes_partition(&self, replacement: &Document) -> bool {
        self.partition_key != replacement.partition_key
    }

    /// Serialize to a JSON value (used for logging stranded documents)
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
