//! Term query implementation for exact keyword matching.

use serde_json::{Value, json};

use crate::query::field_value;

/// A query that matches documents whose keyword field equals a value exactly.
///
/// Like a keyword term lookup, the value is not analyzed: case and whitespace
/// must match.
#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    /// The field to search in.
    field: String,
    /// The exact value to match.
    value: String,
}

impl TermQuery {
    /// Create a new term query.
    pub fn new<F, T>(field: F, value: T) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        TermQuery {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Get the field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Get the value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Check whether a stored document matches.
    pub fn matches(&self, document: &Value) -> bool {
        match field_value(document, &self.field) {
            Some(Value::String(s)) => s == &self.value,
            Some(Value::Array(items)) => items
                .iter()
                .any(|item| item.as_str() == Some(self.value.as_str())),
            _ => false,
        }
    }

    pub fn to_dsl(&self) -> Value {
        json!({ "term": { self.field.clone(): { "value": self.value } } })
    }
}
