//! SQLite document store - Sea-ORM persistence with change fan-out

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::document::merge_field;
use crate::entities::documents;
use crate::rules::{AccessRequest, AccessRules, Operation};
use crate::{DocPath, Document, DocumentStore, Query, Snapshot, StoreError, Subscription, Watch};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Document store persisted in SQLite
///
/// Cloning is cheap; clones share the connection pool, the rules, the
/// change channel and the write lock. Each handle carries the identity it
/// acts as. Writes are serialized so a read-merge-write never loses a
/// concurrent change.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: DatabaseConnection,
    rules: Arc<dyn AccessRules>,
    changes: broadcast::Sender<DocPath>,
    writes: Arc<Mutex<()>>,
    caller: Option<String>,
}

impl SqliteDocumentStore {
    /// Open (or create) a store at `db_path` and run migrations
    pub async fn open(db_path: PathBuf, rules: Arc<dyn AccessRules>) -> Result<Self> {
        let db_path_str = db_path
            .to_str()
            .context("Invalid database path")?
            .replace("\\", "/");

        let db_url = format!("sqlite:{}?mode=rwc", db_path_str);

        let db: DatabaseConnection = Database::connect(db_url.as_str())
            .await
            .context("Failed to connect to database")?;

        let store = Self::with_connection(db, rules).await?;
        info!("Document store initialized at {}", db_path.display());
        Ok(store)
    }

    /// Create a store with an existing database connection
    pub async fn with_connection(db: DatabaseConnection, rules: Arc<dyn AccessRules>) -> Result<Self> {
        crate::migration::Migrator::up(&db, None)
            .await
            .context("Failed to run migrations")?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Ok(Self {
            db,
            rules,
            changes,
            writes: Arc::new(Mutex::new(())),
            caller: None,
        })
    }

    /// A handle to the same store acting as `caller`
    pub fn acting_as(&self, caller: Option<String>) -> Self {
        Self {
            caller,
            ..self.clone()
        }
    }

    pub fn caller(&self) -> Option<&str> {
        self.caller.as_deref()
    }

    async fn load(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let row = documents::Entity::find_by_id((path.collection.clone(), path.id.clone()))
            .one(&self.db)
            .await?;

        row.map(model_to_document).transpose()
    }

    async fn load_parent(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        match path.parent() {
            Some(parent) => Ok(self.load(&parent).await?.map(|d| d.data)),
            None => Ok(None),
        }
    }

    fn authorize(
        &self,
        operation: Operation,
        path: &DocPath,
        existing: Option<&Value>,
        incoming: Option<&Value>,
        parent: Option<&Value>,
    ) -> Result<(), StoreError> {
        let request = AccessRequest {
            caller: self.caller.as_deref(),
            operation,
            path,
            existing,
            incoming,
            parent,
        };

        self.rules.check(&request).inspect_err(|e| {
            warn!("Access denied: {}", e);
        })
    }

    async fn write(&self, path: &DocPath, data: &Value) -> Result<(), StoreError> {
        let now = Utc::now().timestamp_millis();

        let model = documents::ActiveModel {
            collection: Set(path.collection.clone()),
            doc_id: Set(path.id.clone()),
            data: Set(serde_json::to_string(data)?),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // Concurrent first writes converge on a single row
        documents::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([documents::Column::Collection, documents::Column::DocId])
                    .update_columns([documents::Column::Data, documents::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        self.notify(path);
        Ok(())
    }

    fn notify(&self, path: &DocPath) {
        // No receivers simply means nobody is subscribed
        let _ = self.changes.send(path.clone());
    }

    async fn snapshot(&self, watch: &Watch) -> Result<Snapshot, StoreError> {
        match watch {
            Watch::Document(path) => Ok(Snapshot::Document(self.get(path).await?)),
            Watch::Query(query) => Ok(Snapshot::Documents(self.query(query).await?)),
        }
    }
}

fn model_to_document(model: documents::Model) -> Result<Document, StoreError> {
    let path = DocPath::new(model.collection, model.doc_id)?;
    let data = serde_json::from_str(&model.data)?;
    let update_time = Utc
        .timestamp_millis_opt(model.updated_at)
        .single()
        .unwrap_or_else(Utc::now);

    Ok(Document {
        path,
        data,
        update_time,
    })
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let doc = self.load(path).await?;
        let parent = self.load_parent(path).await?;

        self.authorize(
            Operation::Read,
            path,
            doc.as_ref().map(|d| &d.data),
            None,
            parent.as_ref(),
        )?;

        Ok(doc)
    }

    async fn set(&self, path: &DocPath, data: Value) -> Result<(), StoreError> {
        if !data.is_object() {
            return Err(StoreError::InvalidDocument(format!(
                "{} must be a JSON object",
                path
            )));
        }

        let _write = self.writes.lock().await;
        let existing = self.load(path).await?;
        let parent = self.load_parent(path).await?;
        let operation = if existing.is_some() {
            Operation::Update
        } else {
            Operation::Create
        };

        self.authorize(
            operation,
            path,
            existing.as_ref().map(|d| &d.data),
            Some(&data),
            parent.as_ref(),
        )?;

        self.write(path, &data).await?;
        debug!("Set document {}", path);
        Ok(())
    }

    async fn update(&self, path: &DocPath, partial: Map<String, Value>) -> Result<(), StoreError> {
        let _write = self.writes.lock().await;
        let parent = self.load_parent(path).await?;
        let Some(existing) = self.load(path).await? else {
            // Unreadable and missing look the same to the caller
            self.authorize(Operation::Update, path, None, None, parent.as_ref())?;
            return Err(StoreError::NotFound(path.clone()));
        };

        let mut merged = existing.data.clone();
        for (key, value) in partial {
            merge_field(&mut merged, &key, value)?;
        }

        self.authorize(
            Operation::Update,
            path,
            Some(&existing.data),
            Some(&merged),
            parent.as_ref(),
        )?;

        self.write(path, &merged).await?;
        debug!("Updated document {}", path);
        Ok(())
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        let _write = self.writes.lock().await;
        let existing = self.load(path).await?;
        let parent = self.load_parent(path).await?;

        self.authorize(
            Operation::Delete,
            path,
            existing.as_ref().map(|d| &d.data),
            None,
            parent.as_ref(),
        )?;

        documents::Entity::delete_by_id((path.collection.clone(), path.id.clone()))
            .exec(&self.db)
            .await?;

        self.notify(path);
        info!("Deleted document {}", path);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let rows = documents::Entity::find()
            .filter(documents::Column::Collection.eq(query.collection.as_str()))
            .all(&self.db)
            .await?;

        // All documents of one collection share the same parent
        let parent = match rows.first() {
            Some(row) => {
                let path = DocPath::new(row.collection.clone(), row.doc_id.clone())?;
                self.load_parent(&path).await?
            }
            None => None,
        };

        let mut readable = Vec::with_capacity(rows.len());
        for row in rows {
            let doc = model_to_document(row)?;
            let request = AccessRequest {
                caller: self.caller.as_deref(),
                operation: Operation::Read,
                path: &doc.path,
                existing: Some(&doc.data),
                incoming: None,
                parent: parent.as_ref(),
            };
            if self.rules.check(&request).is_ok() {
                readable.push(doc);
            }
        }

        Ok(query.apply(readable))
    }

    fn subscribe(&self, watch: Watch) -> Subscription {
        let store = self.clone();
        let mut changes = self.changes.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            debug!("Subscription started: {:?}", watch);

            if tx.send(store.snapshot(&watch).await).is_err() {
                return;
            }

            loop {
                match changes.recv().await {
                    Ok(path) if !watch.is_affected_by(&path) => continue,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Subscription lagged by {} changes, resyncing", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }

                if tx.send(store.snapshot(&watch).await).is_err() {
                    break;
                }
            }

            debug!("Subscription ended: {:?}", watch);
        });

        Subscription::new(rx, Some(task))
    }

    fn scoped(&self, caller: Option<&str>) -> Arc<dyn DocumentStore> {
        Arc::new(self.acting_as(caller.map(str::to_string)))
    }
}
