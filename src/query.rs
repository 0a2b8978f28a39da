//! Document matching, ordering and limiting.

use crate::store::Document;
use serde_json::Value;
use std::cmp::Ordering;

/// A predicate over documents.
///
/// Only the two shapes the catalog needs: match everything, or match documents
/// whose top-level `field` equals a JSON value exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    All,
    Eq(String, Value),
}

impl Query {
    pub fn all() -> Self {
        Query::All
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Query::Eq(field.to_string(), value.into())
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Query::All => true,
            Query::Eq(field, value) => doc.get(field) == Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Sort and limit applied to a `find` result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    sort: Option<(String, SortOrder)>,
    limit: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort by a top-level field. The sort is stable.
    pub fn sort(mut self, field: &str, order: SortOrder) -> Self {
        self.sort = Some((field.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Apply the sort, then the limit, to an already-filtered result set.
    pub fn apply(&self, mut docs: Vec<Document>) -> Vec<Document> {
        if let Some((field, order)) = &self.sort {
            docs.sort_by(|a, b| {
                let ord = compare_values(a.get(field), b.get(field));
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}

/// Total order over optional JSON values used for sorting.
///
/// Missing < null < numbers < strings < booleans < arrays/objects. Strings
/// compare bytewise, so ISO dates sort chronologically only because of their
/// layout. Arrays and objects compare equal to each other.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Bool(_)) => 4,
            Some(Value::Array(_)) | Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (None, Some(_)) if x.is_u64() => Ordering::Greater,
            (Some(_), None) if y.is_u64() => Ordering::Less,
            _ if x.is_u64() && y.is_u64() => x.as_u64().cmp(&y.as_u64()),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
