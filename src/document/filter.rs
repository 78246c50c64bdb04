//! Query filter expressions
//!
//! A deliberately small conjunction of field conditions. Transforms use it
//! to tell the pager which documents to select.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Document;

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Neq,
    Exists,
    NotExists,
}

/// A single `field <op> value` condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
}

impl FilterCondition {
    /// Check a document against this condition
    pub fn matches(&self, doc: &Document) -> bool {
        let field_value = doc.get(&self.field);

        match (self.operator, field_value) {
            (FilterOperator::Eq, Some(v)) => v == self.value,
            (FilterOperator::Neq, Some(v)) => v != self.value,
            (FilterOperator::Neq, None) => true,
            (FilterOperator::Exists, Some(v)) => !v.is_null(),
            (FilterOperator::NotExists, Some(v)) => v.is_null(),
            (FilterOperator::NotExists, None) => true,
            _ => false,
        }
    }
}

/// Conjunction of conditions; empty selects every document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
}

impl QueryFilter {
    /// Select every document
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an equality condition
    pub fn eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.conditions.push(FilterCondition {
            field: field.into(),
            operator: FilterOperator::Eq,
            value,
        });
        self
    }

    /// Add an inequality condition
    pub fn neq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.conditions.push(FilterCondition {
            field: field.into(),
            operator: FilterOperator::Neq,
            value,
        });
        self
    }

    /// Require a non-null field
    pub fn exists(mut self, field: impl Into<String>) -> Self {
        self.conditions.push(FilterCondition {
            field: field.into(),
            operator: FilterOperator::Exists,
            value: Value::Null,
        });
        self
    }

    /// Require an absent or null field
    pub fn not_exists(mut self, field: impl Into<String>) -> Self {
        self.conditions.push(FilterCondition {
            field: field.into(),
            operator: FilterOperator::NotExists,
            value: Value::Null,
        });
        self
    }

    /// Check a document against every condition
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }
}

impl fmt::Display for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return write!(f, "*");
        }
        for (i, c) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            match c.operator {
                FilterOperator::Eq => write!(f, "{} = {}", c.field, c.value)?,
                FilterOperator::Neq => write!(f, "{} != {}", c.field, c.value)?,
                FilterOperator::Exists => write!(f, "EXISTS({})", c.field)?,
                FilterOperator::NotExists => write!(f, "NOT EXISTS({})", c.field)?,
            }
        }
        Ok(())
    }
}
