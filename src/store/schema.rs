//! Explicit collection mappings.
//!
//! Collections are always created with declared field types. Geo points in
//! particular are never left to type inference, which would map a
//! `{"lat", "lon"}` object as two plain numbers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::record::{POST_COLLECTION, USER_COLLECTION};

/// Field types a collection can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    GeoPoint,
    Keyword,
    Float,
    Long,
}

impl FieldType {
    /// Mapping type name understood by the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::GeoPoint => "geo_point",
            FieldType::Keyword => "keyword",
            FieldType::Float => "float",
            FieldType::Long => "long",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Float | FieldType::Long)
    }
}

/// Type and searchability of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field_type: FieldType,
    /// Non-indexed fields are stored and returned but cannot be queried.
    pub indexed: bool,
}

impl FieldMapping {
    pub fn indexed(field_type: FieldType) -> Self {
        FieldMapping {
            field_type,
            indexed: true,
        }
    }

    pub fn stored_only(field_type: FieldType) -> Self {
        FieldMapping {
            field_type,
            indexed: false,
        }
    }
}

/// The declared mapping of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    name: String,
    fields: BTreeMap<String, FieldMapping>,
}

impl CollectionSchema {
    /// Create a schema with no fields.
    pub fn new<S: Into<String>>(name: S) -> Self {
        CollectionSchema {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add or replace a field mapping.
    pub fn with_field<S: Into<String>>(mut self, name: S, mapping: FieldMapping) -> Self {
        self.fields.insert(name.into(), mapping);
        self
    }

    /// The `post` collection.
    pub fn post() -> Self {
        CollectionSchema::new(POST_COLLECTION)
            .with_field("kind", FieldMapping::indexed(FieldType::Keyword))
            .with_field("id", FieldMapping::indexed(FieldType::Keyword))
            .with_field("user", FieldMapping::stored_only(FieldType::Keyword))
            .with_field("message", FieldMapping::stored_only(FieldType::Keyword))
            .with_field("location", FieldMapping::indexed(FieldType::GeoPoint))
            .with_field("url", FieldMapping::stored_only(FieldType::Keyword))
            .with_field("type", FieldMapping::stored_only(FieldType::Keyword))
            .with_field("face", FieldMapping::indexed(FieldType::Float))
    }

    /// The `user` collection.
    pub fn user() -> Self {
        CollectionSchema::new(USER_COLLECTION)
            .with_field("kind", FieldMapping::indexed(FieldType::Keyword))
            .with_field("username", FieldMapping::indexed(FieldType::Keyword))
            .with_field("password_hash", FieldMapping::stored_only(FieldType::Keyword))
            .with_field("salt", FieldMapping::stored_only(FieldType::Keyword))
            .with_field("age", FieldMapping::stored_only(FieldType::Long))
            .with_field("gender", FieldMapping::stored_only(FieldType::Keyword))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, name: &str) -> Option<&FieldMapping> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldMapping> {
        &self.fields
    }

    /// Render the create-collection body.
    pub fn to_mapping(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, mapping)| {
                let mut field = json!({ "type": mapping.field_type.as_str() });
                if !mapping.indexed {
                    field["index"] = Value::Bool(false);
                }
                (name.clone(), field)
            })
            .collect();
        json!({ "mappings": { "properties": properties } })
    }
}
