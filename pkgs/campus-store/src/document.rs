//! Document paths, stored documents and field-path helpers

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::StoreError;

/// Location of a document: a collection path (odd number of segments, e.g.
/// `products` or `conversations/{cid}/messages`) and a document id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Result<Self, StoreError> {
        let collection = collection.into();
        let id = id.into();

        let segments: Vec<&str> = collection.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) || segments.len() % 2 == 0 {
            return Err(StoreError::InvalidPath(format!("{}/{}", collection, id)));
        }
        if id.is_empty() || id.contains('/') {
            return Err(StoreError::InvalidPath(format!("{}/{}", collection, id)));
        }

        Ok(Self { collection, id })
    }

    /// Path of a document in a subcollection of this document
    pub fn child(&self, collection: &str, id: impl Into<String>) -> Result<Self, StoreError> {
        Self::new(format!("{}/{}/{}", self.collection, self.id, collection), id)
    }

    /// The document owning this document's subcollection, if any
    pub fn parent(&self) -> Option<DocPath> {
        let mut parts = self.collection.rsplitn(3, '/');
        let _sub = parts.next()?;
        let parent_id = parts.next()?;
        let parent_collection = parts.next()?;
        Some(DocPath {
            collection: parent_collection.to_string(),
            id: parent_id.to_string(),
        })
    }

    /// First segment of the collection path
    pub fn root_collection(&self) -> &str {
        self.collection.split('/').next().unwrap_or_default()
    }

    /// Trailing segment of the collection path
    pub fn leaf_collection(&self) -> &str {
        self.collection.rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub path: DocPath,
    pub data: Value,
    pub update_time: DateTime<Utc>,
}

impl Document {
    pub fn id(&self) -> &str {
        &self.path.id
    }

    /// Deserialize the body, injecting the document id as `id` when the
    /// body does not carry one
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        if let Value::Object(map) = &mut data {
            map.entry("id")
                .or_insert_with(|| Value::String(self.path.id.clone()));
        }
        Ok(serde_json::from_value(data)?)
    }
}

/// Look up a dotted field path (`seller.id`) inside a document body
pub fn field<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(data, |current, segment| current.as_object()?.get(segment))
}

/// Assign a dotted field path, creating intermediate objects as needed
pub fn set_field(data: &mut Value, path: &str, value: Value) -> Result<(), StoreError> {
    let mut segments = path.split('.').peekable();
    let mut current = data;

    while let Some(segment) = segments.next() {
        if segment.is_empty() {
            return Err(StoreError::InvalidDocument(format!(
                "empty segment in field path '{}'",
                path
            )));
        }

        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let map = current
            .as_object_mut()
            .ok_or_else(|| StoreError::InvalidDocument(path.to_string()))?;

        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return Ok(());
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    Ok(())
}

/// Marker key of an increment transform, see [`increment`]
pub const INCREMENT: &str = "$increment";

/// Update value adding `by` to the number currently stored at the field.
/// A missing or non-numeric field counts as 0. The store applies it at write
/// time, so concurrent increments are never lost.
pub fn increment(by: i64) -> Value {
    let mut transform = Map::new();
    transform.insert(INCREMENT.to_string(), Value::from(by));
    Value::Object(transform)
}

fn as_increment(value: &Value) -> Option<i64> {
    let transform = value.as_object().filter(|map| map.len() == 1)?;
    transform.get(INCREMENT)?.as_i64()
}

/// Apply one entry of a partial update: plain values are assigned,
/// [`increment`] transforms are added to the current value
pub fn merge_field(data: &mut Value, path: &str, value: Value) -> Result<(), StoreError> {
    match as_increment(&value) {
        Some(by) => {
            let current = field(data, path).and_then(Value::as_i64).unwrap_or(0);
            set_field(data, path, Value::from(current + by))
        }
        None => set_field(data, path, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_doc_path_validation() {
        assert!(DocPath::new("products", "p1").is_ok());
        assert!(DocPath::new("conversations/c1/messages", "m1").is_ok());
        assert!(DocPath::new("conversations/c1", "m1").is_err());
        assert!(DocPath::new("products", "").is_err());
        assert!(DocPath::new("products", "a/b").is_err());
        assert!(DocPath::new("", "p1").is_err());
    }

    #[test]
    fn test_child_and_parent() {
        let conv = DocPath::new("conversations", "c1").unwrap();
        let msg = conv.child("messages", "m1").unwrap();
        assert_eq!(msg.collection, "conversations/c1/messages");
        assert_eq!(msg.parent(), Some(conv.clone()));
        assert_eq!(msg.root_collection(), "conversations");
        assert_eq!(msg.leaf_collection(), "messages");
        assert_eq!(conv.parent(), None);
    }

    #[test]
    fn test_nested_field_assignment() {
        let mut data = json!({ "unreadCounts": { "a": 2, "b": 0 } });
        set_field(&mut data, "unreadCounts.b", json!(3)).unwrap();
        set_field(&mut data, "meta.created.by", json!("a")).unwrap();

        assert_eq!(field(&data, "unreadCounts.a"), Some(&json!(2)));
        assert_eq!(field(&data, "unreadCounts.b"), Some(&json!(3)));
        assert_eq!(field(&data, "meta.created.by"), Some(&json!("a")));
        assert!(set_field(&mut data, "bad..path", json!(1)).is_err());
    }

    #[test]
    fn test_decode_injects_id() {
        #[derive(Deserialize)]
        struct Item {
            id: String,
            title: String,
        }

        let doc = Document {
            path: DocPath::new("products", "p9").unwrap(),
            data: json!({ "title": "Lamp" }),
            update_time: Utc::now(),
        };
        let item: Item = doc.decode().unwrap();
        assert_eq!(item.id, "p9");
        assert_eq!(item.title, "Lamp");
    }

    #[test]
    fn test_increment_transform() {
        let mut data = json!({ "unreadCounts": { "b": 2 } });
        merge_field(&mut data, "unreadCounts.b", increment(1)).unwrap();
        merge_field(&mut data, "unreadCounts.a", increment(3)).unwrap();
        merge_field(&mut data, "lastMessage", json!("hi")).unwrap();

        assert_eq!(data["unreadCounts"]["b"], 3);
        assert_eq!(data["unreadCounts"]["a"], 3);
        assert_eq!(data["lastMessage"], "hi");

        // Objects that merely contain the marker key are plain values
        let value = json!({ "$increment": 1, "other": true });
        merge_field(&mut data, "meta", value.clone()).unwrap();
        assert_eq!(data["meta"], value);
    }
}
