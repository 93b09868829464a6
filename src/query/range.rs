//! Range query implementation for numeric thresholds.

use serde_json::{Map, Value, json};

use crate::query::field_value;

/// Bound type for range queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound<T> {
    /// Inclusive bound.
    Included(T),
    /// Exclusive bound.
    Excluded(T),
    /// Unbounded (no limit).
    Unbounded,
}

impl<T: PartialOrd> Bound<T> {
    /// Check if a value satisfies this bound as a lower bound.
    pub fn contains_lower(&self, value: &T) -> bool {
        match self {
            Bound::Included(bound) => value >= bound,
            Bound::Excluded(bound) => value > bound,
            Bound::Unbounded => true,
        }
    }

    /// Check if a value satisfies this bound as an upper bound.
    pub fn contains_upper(&self, value: &T) -> bool {
        match self {
            Bound::Included(bound) => value <= bound,
            Bound::Excluded(bound) => value < bound,
            Bound::Unbounded => true,
        }
    }
}

/// A query that matches documents whose numeric field lies in a range.
///
/// The field name is used verbatim; no allow-list is applied here.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    /// The field to search in.
    field: String,
    /// Lower bound of the range.
    lower_bound: Bound<f64>,
    /// Upper bound of the range.
    upper_bound: Bound<f64>,
}

impl RangeQuery {
    /// Create a range query with custom bound types.
    pub fn with_bounds<S: Into<String>>(
        field: S,
        lower_bound: Bound<f64>,
        upper_bound: Bound<f64>,
    ) -> Self {
        RangeQuery {
            field: field.into(),
            lower_bound,
            upper_bound,
        }
    }

    /// Create a range query for values greater than or equal to the given value.
    pub fn greater_than_or_equal<S: Into<String>>(field: S, value: f64) -> Self {
        Self::with_bounds(field, Bound::Included(value), Bound::Unbounded)
    }

    /// Create a range query for values greater than the given value.
    pub fn greater_than<S: Into<String>>(field: S, value: f64) -> Self {
        Self::with_bounds(field, Bound::Excluded(value), Bound::Unbounded)
    }

    /// Create a range query for values less than or equal to the given value.
    pub fn less_than_or_equal<S: Into<String>>(field: S, value: f64) -> Self {
        Self::with_bounds(field, Bound::Unbounded, Bound::Included(value))
    }

    /// Create a range query for values less than the given value.
    pub fn less_than<S: Into<String>>(field: S, value: f64) -> Self {
        Self::with_bounds(field, Bound::Unbounded, Bound::Excluded(value))
    }

    /// Get the field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Get the lower bound.
    pub fn lower_bound(&self) -> &Bound<f64> {
        &self.lower_bound
    }

    /// Get the upper bound.
    pub fn upper_bound(&self) -> &Bound<f64> {
        &self.upper_bound
    }

    /// Check if a number falls within the range.
    pub fn contains(&self, value: f64) -> bool {
        self.lower_bound.contains_lower(&value) && self.upper_bound.contains_upper(&value)
    }

    /// Check whether a stored document matches. Documents without the field,
    /// or with a non-numeric value in it, never match.
    pub fn matches(&self, document: &Value) -> bool {
        field_value(document, &self.field)
            .and_then(Value::as_f64)
            .is_some_and(|v| self.contains(v))
    }

    /// Like [`RangeQuery::matches`], but compares at single precision, the
    /// way the store compares values of a `float` field: both the stored
    /// value and the bounds are rounded to `f32` first.
    pub fn matches_as_f32(&self, document: &Value) -> bool {
        let round = |v: f64| v as f32 as f64;
        let narrowed = RangeQuery {
            field: self.field.clone(),
            lower_bound: map_bound(self.lower_bound, round),
            upper_bound: map_bound(self.upper_bound, round),
        };
        field_value(document, &self.field)
            .and_then(Value::as_f64)
            .is_some_and(|v| narrowed.contains(round(v)))
    }

    pub fn to_dsl(&self) -> Value {
        let mut bounds = Map::new();
        match self.lower_bound {
            Bound::Included(v) => {
                bounds.insert("gte".to_string(), json!(v));
            }
            Bound::Excluded(v) => {
                bounds.insert("gt".to_string(), json!(v));
            }
            Bound::Unbounded => {}
        }
        match self.upper_bound {
            Bound::Included(v) => {
                bounds.insert("lte".to_string(), json!(v));
            }
            Bound::Excluded(v) => {
                bounds.insert("lt".to_string(), json!(v));
            }
            Bound::Unbounded => {}
        }
        json!({ "range": { self.field.clone(): Value::Object(bounds) } })
    }
}

fn map_bound(bound: Bound<f64>, f: impl Fn(f64) -> f64) -> Bound<f64> {
    match bound {
        Bound::Included(v) => Bound::Included(f(v)),
        Bound::Excluded(v) => Bound::Excluded(f(v)),
        Bound::Unbounded => Bound::Unbounded,
    }
}
