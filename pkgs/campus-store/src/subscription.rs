//! Subscriptions delivering full snapshots on a dedicated channel

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{Document, StoreError};

/// Complete state of a watched target
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// Watched document; `None` if it does not exist
    Document(Option<Document>),
    /// Full result of a watched query
    Documents(Vec<Document>),
}

impl Snapshot {
    pub fn into_documents(self) -> Vec<Document> {
        match self {
            Snapshot::Document(doc) => doc.into_iter().collect(),
            Snapshot::Documents(docs) => docs,
        }
    }
}

/// Live subscription handle. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Result<Snapshot, StoreError>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<Result<Snapshot, StoreError>>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self { receiver, task }
    }

    /// Wait for the next snapshot or error. `None` once the producer stops.
    pub async fn next(&mut self) -> Option<Result<Snapshot, StoreError>> {
        self.receiver.recv().await
    }

    /// Take a snapshot if one is already queued
    pub fn try_next(&mut self) -> Option<Result<Snapshot, StoreError>> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
