// Copyright 2024 Campus Market Team.
//
// Tests for SqliteDocumentStore

use campus_store::{
    increment, AllowAll, DocPath, DocumentStore, MarketRules, Query, Snapshot,
    SqliteDocumentStore, StoreError, Watch,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

async fn open_store(path: &NamedTempFile) -> SqliteDocumentStore {
    SqliteDocumentStore::open(path.path().to_path_buf(), Arc::new(MarketRules))
        .await
        .expect("Failed to open document store")
}

fn partial(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_set_get_and_delete() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = SqliteDocumentStore::open(temp_file.path().to_path_buf(), Arc::new(AllowAll))
        .await
        .unwrap();

    let path = DocPath::new("products", "p1").unwrap();
    store
        .set(&path, json!({ "title": "Desk", "price": 5000 }))
        .await
        .expect("Failed to set document");

    let doc = store.get(&path).await.unwrap().expect("document exists");
    assert_eq!(doc.data["title"], "Desk");
    assert_eq!(doc.id(), "p1");

    store.delete(&path).await.unwrap();
    assert!(store.get(&path).await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_rejects_non_object() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = open_store(&temp_file).await.acting_as(Some("alice".into()));
    let path = DocPath::new("users", "alice").unwrap();

    let result = store.set(&path, json!("just a string")).await;
    assert!(matches!(result, Err(StoreError::InvalidDocument(_))));
}

#[tokio::test]
async fn test_update_merges_nested_fields() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = open_store(&temp_file).await.acting_as(Some("a".into()));
    let path = DocPath::new("conversations", "a~b~p1").unwrap();

    store
        .set(
            &path,
            json!({
                "participants": ["a", "b"],
                "lastMessage": "",
                "unreadCounts": { "a": 0, "b": 0 }
            }),
        )
        .await
        .unwrap();

    store
        .update(
            &path,
            partial(json!({ "lastMessage": "hello", "unreadCounts.b": 1 })),
        )
        .await
        .unwrap();

    let doc = store.get(&path).await.unwrap().unwrap();
    assert_eq!(doc.data["lastMessage"], "hello");
    assert_eq!(doc.data["unreadCounts"]["a"], 0);
    assert_eq!(doc.data["unreadCounts"]["b"], 1);
}

#[tokio::test]
async fn test_concurrent_increments_are_not_lost() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = open_store(&temp_file).await;
    let as_a = store.acting_as(Some("a".into()));
    let as_b = store.acting_as(Some("b".into()));
    let path = DocPath::new("conversations", "a~b~p1").unwrap();

    as_a.set(
        &path,
        json!({ "participants": ["a", "b"], "unreadCounts": { "a": 0, "b": 0 } }),
    )
    .await
    .unwrap();

    let bump = |store: &SqliteDocumentStore| {
        let mut fields = Map::new();
        fields.insert("unreadCounts.b".to_string(), increment(1));
        let store = store.clone();
        let path = path.clone();
        async move { store.update(&path, fields).await }
    };
    let (first, second, third) = tokio::join!(bump(&as_a), bump(&as_a), bump(&as_b));
    first.unwrap();
    second.unwrap();
    third.unwrap();

    let doc = as_a.get(&path).await.unwrap().unwrap();
    assert_eq!(doc.data["unreadCounts"]["b"], 3);
    assert_eq!(doc.data["unreadCounts"]["a"], 0);
}

#[tokio::test]
async fn test_update_missing_document_is_not_found() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = open_store(&temp_file).await.acting_as(Some("alice".into()));
    let path = DocPath::new("users", "alice").unwrap();

    let result = store.update(&path, partial(json!({ "name": "A" }))).await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_seller_rules_enforced() {
    let temp_file = NamedTempFile::new().unwrap();
    let base = open_store(&temp_file).await;
    let alice = base.acting_as(Some("alice".into()));
    let bob = base.acting_as(Some("bob".into()));
    let path = DocPath::new("products", "p1").unwrap();

    // Cannot post a listing on someone else's behalf
    let forged = bob
        .set(&path, json!({ "title": "Desk", "seller": { "id": "alice" } }))
        .await;
    assert!(forged.unwrap_err().is_permission_denied());

    alice
        .set(&path, json!({ "title": "Desk", "seller": { "id": "alice" } }))
        .await
        .unwrap();

    let denied = bob.update(&path, partial(json!({ "status": "sold" }))).await;
    assert!(denied.unwrap_err().is_permission_denied());

    let denied = bob.delete(&path).await;
    assert!(denied.unwrap_err().is_permission_denied());

    alice
        .update(&path, partial(json!({ "status": "sold" })))
        .await
        .unwrap();

    // Anyone may read listings
    let anonymous = base.acting_as(None);
    let doc = anonymous.get(&path).await.unwrap().unwrap();
    assert_eq!(doc.data["status"], "sold");
}

#[tokio::test]
async fn test_missing_conversation_read_denied() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = open_store(&temp_file).await.acting_as(Some("a".into()));
    let path = DocPath::new("conversations", "a~b~p1").unwrap();

    let result = store.get(&path).await;
    assert!(matches!(result, Err(StoreError::PermissionDenied(_))));
}

#[tokio::test]
async fn test_query_filters_unreadable_documents() {
    let temp_file = NamedTempFile::new().unwrap();
    let base = open_store(&temp_file).await;
    let a = base.acting_as(Some("a".into()));
    let c = base.acting_as(Some("c".into()));

    a.set(
        &DocPath::new("conversations", "a~b~p1").unwrap(),
        json!({ "participants": ["a", "b"] }),
    )
    .await
    .unwrap();
    c.set(
        &DocPath::new("conversations", "b~c~p2").unwrap(),
        json!({ "participants": ["c", "b"] }),
    )
    .await
    .unwrap();

    let query = Query::collection("conversations").where_array_contains("participants", "a");
    let docs = a.query(&query).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id(), "a~b~p1");

    // Without a filter, rules still hide other people's conversations
    let all = c.query(&Query::collection("conversations")).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id(), "b~c~p2");
}

#[tokio::test]
async fn test_concurrent_first_writes_converge() {
    let temp_file = NamedTempFile::new().unwrap();
    let base = open_store(&temp_file).await;
    let a = base.acting_as(Some("a".into()));
    let b = base.acting_as(Some("b".into()));
    let path = DocPath::new("conversations", "a~b~p1").unwrap();
    let body = json!({ "participants": ["a", "b"], "lastMessage": "" });

    let (ra, rb) = tokio::join!(a.set(&path, body.clone()), b.set(&path, body.clone()));
    ra.unwrap();
    rb.unwrap();

    let docs = a.query(&Query::collection("conversations")).await.unwrap();
    assert_eq!(docs.len(), 1);
}

#[tokio::test]
async fn test_subscription_pushes_full_snapshots() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = open_store(&temp_file).await.acting_as(Some("alice".into()));

    let mut sub = store.subscribe(Watch::Query(Query::collection("products")));

    let first = tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .expect("initial snapshot")
        .unwrap()
        .unwrap();
    assert_eq!(first, Snapshot::Documents(vec![]));

    for id in ["p1", "p2"] {
        store
            .set(
                &DocPath::new("products", id).unwrap(),
                json!({ "title": id, "seller": { "id": "alice" } }),
            )
            .await
            .unwrap();
    }

    // Each push is the complete collection, so the latest one holds both
    let mut latest = Vec::new();
    while latest.len() < 2 {
        let snapshot = tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .expect("snapshot after write")
            .unwrap()
            .unwrap();
        latest = snapshot.into_documents();
    }
    assert_eq!(latest.len(), 2);
}

#[tokio::test]
async fn test_document_subscription_reports_errors() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = open_store(&temp_file).await.acting_as(Some("mallory".into()));
    let path = DocPath::new("conversations", "a~b~p1").unwrap();

    let mut sub = store.subscribe(Watch::Document(path));
    let item = tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .unwrap()
        .unwrap();
    assert!(item.unwrap_err().is_permission_denied());
}
