//! Campus Store - real-time document storage for the Campus Market client
//!
//! This crate provides the document database the marketplace client talks to:
//! JSON documents addressed by hierarchical paths, persisted in SQLite through
//! Sea-ORM, guarded by server-side access rules, and observable through
//! subscriptions that push complete snapshots.
//!
//! # Architecture
//!
//! - **DocumentStore**: The contract every backend implements (`get`, `set`,
//!   `update`, `delete`, `query`, `subscribe`)
//! - **SqliteDocumentStore**: Sea-ORM backed implementation with change
//!   notifications fanned out to subscribers
//! - **AccessRules**: Authorization evaluated on every read and write;
//!   `MarketRules` holds the marketplace policy
//! - **Subscription**: A dedicated channel of full snapshots for one document
//!   or one query
//!
//! # Database Schema
//!
//! - `documents`: One row per document, keyed by `(collection, doc_id)`, with
//!   the JSON body and create/update timestamps
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use campus_store::{DocPath, DocumentStore, MarketRules, SqliteDocumentStore};
//! use serde_json::json;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = SqliteDocumentStore::open("documents.db".into(), Arc::new(MarketRules)).await?;
//! let alice = store.acting_as(Some("alice".to_string()));
//!
//! let path = DocPath::new("users", "alice")?;
//! alice.set(&path, json!({ "name": "Alice" })).await?;
//! let doc = alice.get(&path).await?;
//! assert!(doc.is_some());
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod entities;
pub mod error;
pub mod migration;
pub mod query;
pub mod rules;
pub mod sqlite_store;
pub mod subscription;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

pub use document::{field, increment, merge_field, set_field, DocPath, Document, INCREMENT};
pub use error::StoreError;
pub use query::{Direction, Filter, Query, Watch};
pub use rules::{AccessRequest, AccessRules, AllowAll, MarketRules, Operation};
pub use sqlite_store::SqliteDocumentStore;
pub use subscription::{Snapshot, Subscription};

/// Document database contract consumed by the marketplace client.
///
/// Every call suspends until the backend answers. Authorization is enforced
/// by the implementation; denial surfaces as [`StoreError::PermissionDenied`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document, `None` if it does not exist
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    /// Write a whole document, replacing any previous body (last writer wins)
    async fn set(&self, path: &DocPath, data: Value) -> Result<(), StoreError>;

    /// Merge fields into an existing document. Keys containing `.` address
    /// nested fields; [`increment`] values add to the stored number. Fails
    /// with `NotFound` when the document is absent.
    async fn update(&self, path: &DocPath, partial: Map<String, Value>) -> Result<(), StoreError>;

    /// Remove a document
    async fn delete(&self, path: &DocPath) -> Result<(), StoreError>;

    /// Run a one-shot query
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Observe a document or query. The first item is the current state;
    /// each later item is a full replacement snapshot.
    fn subscribe(&self, watch: Watch) -> Subscription;

    /// A handle to the same store acting on behalf of `caller`
    fn scoped(&self, caller: Option<&str>) -> Arc<dyn DocumentStore>;
}
