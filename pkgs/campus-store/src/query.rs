//! Collection queries and subscription targets

use serde_json::Value;
use std::cmp::Ordering;

use crate::document::field;
use crate::{DocPath, Document};

/// Document filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value
    Eq { field: String, value: Value },
    /// Array field contains value
    ArrayContains { field: String, value: Value },
}

impl Filter {
    pub fn matches(&self, data: &Value) -> bool {
        match self {
            Filter::Eq { field: name, value } => field(data, name) == Some(value),
            Filter::ArrayContains { field: name, value } => field(data, name)
                .and_then(Value::as_array)
                .map(|items| items.contains(value))
                .unwrap_or(false),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Query over one collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filter: Option<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: None,
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some(Filter::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn where_array_contains(
        mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.filter = Some(Filter::ArrayContains {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Filter, order and truncate a set of candidate documents
    pub(crate) fn apply(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut docs: Vec<Document> = match &self.filter {
            Some(filter) => docs.into_iter().filter(|d| filter.matches(&d.data)).collect(),
            None => docs,
        };

        if let Some((name, direction)) = &self.order_by {
            docs.sort_by(|a, b| {
                let ord = compare_values(field(&a.data, name), field(&b.data, name));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}

/// Ordering used by queries: missing and null sort first, then booleans,
/// numbers and strings
pub(crate) fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Target of a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum Watch {
    Document(DocPath),
    Query(Query),
}

impl Watch {
    /// Whether a write at `path` can change what this watch observes
    pub fn is_affected_by(&self, path: &DocPath) -> bool {
        match self {
            Watch::Document(watched) => watched == path,
            Watch::Query(query) => query.collection == path.collection,
        }
    }
}
