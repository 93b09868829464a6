//! Store-neutral queries over JSON documents.
//!
//! A [`Query`] is one of three shapes: an exact keyword [`TermQuery`], a
//! [`GeoDistanceQuery`] around a point, or a numeric [`RangeQuery`]. Each
//! shape can evaluate itself against a stored JSON document (used by the
//! in-memory store) and render itself as the document store's query DSL
//! (used by the Elasticsearch store).

pub mod geo;
pub mod range;
pub mod term;

use serde_json::Value;

pub use self::geo::GeoDistanceQuery;
pub use self::range::{Bound, RangeQuery};
pub use self::term::TermQuery;

/// A query against one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Term(TermQuery),
    GeoDistance(GeoDistanceQuery),
    Range(RangeQuery),
}

impl Query {
    /// The document field this query inspects.
    pub fn field(&self) -> &str {
        match self {
            Query::Term(q) => q.field(),
            Query::GeoDistance(q) => q.field(),
            Query::Range(q) => q.field(),
        }
    }

    /// Render the query DSL body (the value of the top-level `"query"` key).
    pub fn to_dsl(&self) -> Value {
        match self {
            Query::Term(q) => q.to_dsl(),
            Query::GeoDistance(q) => q.to_dsl(),
            Query::Range(q) => q.to_dsl(),
        }
    }

    /// A short human-readable description, used in logs.
    pub fn description(&self) -> String {
        match self {
            Query::Term(q) => format!("TermQuery(field:{}, value:{})", q.field(), q.value()),
            Query::GeoDistance(q) => format!(
                "GeoDistanceQuery(field:{}, center:({}, {}), distance:{})",
                q.field(),
                q.center().lat,
                q.center().lon,
                q.distance()
            ),
            Query::Range(q) => format!(
                "RangeQuery(field:{}, lower:{:?}, upper:{:?})",
                q.field(),
                q.lower_bound(),
                q.upper_bound()
            ),
        }
    }
}

impl From<TermQuery> for Query {
    fn from(value: TermQuery) -> Self {
        Query::Term(value)
    }
}

impl From<GeoDistanceQuery> for Query {
    fn from(value: GeoDistanceQuery) -> Self {
        Query::GeoDistance(value)
    }
}

impl From<RangeQuery> for Query {
    fn from(value: RangeQuery) -> Self {
        Query::Range(value)
    }
}

/// Resolve a possibly dotted field path (`"a.b.c"`) inside a document.
pub fn field_value<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(direct) = document.get(path) {
        return Some(direct);
    }
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::geo::{Distance, GeoPoint};

    #[test]
    fn test_field_value_paths() {
        let doc = json!({"face": 0.9, "meta": {"stats": {"views": 3}}, "a.b": 1});
        assert_eq!(field_value(&doc, "face"), Some(&json!(0.9)));
        assert_eq!(field_value(&doc, "meta.stats.views"), Some(&json!(3)));
        assert_eq!(field_value(&doc, "a.b"), Some(&json!(1)));
        assert_eq!(field_value(&doc, "meta.missing"), None);
    }

    #[test]
    fn test_query_field_and_description() {
        let query: Query = GeoDistanceQuery::new(
            "location",
            GeoPoint::new(1.0, 2.0),
            Distance::kilometers(5.0).unwrap(),
        )
        .into();
        assert_eq!(query.field(), "location");
        assert_eq!(
            query.description(),
            "GeoDistanceQuery(field:location, center:(1, 2), distance:5km)"
        );

        let query: Query = RangeQuery::greater_than_or_equal("face", 0.9).into();
        assert_eq!(query.field(), "face");
        assert!(query.description().starts_with("RangeQuery(field:face"));
    }
}
