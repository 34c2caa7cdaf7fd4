//! Live views fed by store subscriptions
//!
//! Every snapshot fully replaces the state it feeds. An error from the
//! subscription is logged and the last good state stays in place.

use campus_store::{Direction, DocPath, DocumentStore, Query, Snapshot, Subscription, Watch};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::conversations::{
    conversation_path, conversations_query, decode_all, mark_read, messages_query, total_unread,
};
use crate::listings::PRODUCTS;
use crate::models::{ChatMessage, ConversationRecord, Product, User};
use crate::optimistic::SharedState;
use crate::profile::USERS;
use crate::MarketError;

/// Background task driving a state from a subscription. Dropping it stops
/// the task.
pub struct Feed {
    name: &'static str,
    task: JoinHandle<()>,
}

impl Feed {
    /// Replace `state` with `decode(snapshot)` for every snapshot
    pub fn spawn<T, F>(
        name: &'static str,
        mut subscription: Subscription,
        state: Arc<SharedState<T>>,
        decode: F,
    ) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Snapshot) -> T + Send + 'static,
    {
        let task = tokio::spawn(async move {
            while let Some(item) = subscription.next().await {
                match item {
                    Ok(snapshot) => {
                        state.replace(decode(snapshot));
                        debug!("{} feed updated", name);
                    }
                    Err(e) => warn!("{} feed error, keeping last state: {}", name, e),
                }
            }
            debug!("{} feed closed", name);
        });

        Self { name, task }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// All listings, newest first
pub fn products_feed(
    store: &dyn DocumentStore,
    products: Arc<SharedState<Vec<Product>>>,
) -> Feed {
    let query = Query::collection(PRODUCTS).order_by("postedDate", Direction::Descending);
    Feed::spawn(
        "products",
        store.subscribe(Watch::Query(query)),
        products,
        |snapshot| decode_all::<Product>(&snapshot.into_documents()),
    )
}

/// Total unread messages for `uid` across their conversations
pub fn unread_feed(store: &dyn DocumentStore, uid: &str, unread: Arc<SharedState<u32>>) -> Feed {
    let uid = uid.to_string();
    Feed::spawn(
        "unread",
        store.subscribe(Watch::Query(conversations_query(&uid))),
        unread,
        move |snapshot| {
            let records = decode_all::<ConversationRecord>(&snapshot.into_documents());
            total_unread(&records, &uid)
        },
    )
}

/// Live conversation, its messages and the counterpart's profile. The
/// reader's unread counter is reset whenever a snapshot shows it non-zero.
pub struct ChatRoom {
    id: String,
    conversation: Arc<SharedState<Option<ConversationRecord>>>,
    messages: Arc<SharedState<Vec<ChatMessage>>>,
    counterpart: Arc<SharedState<Option<User>>>,
    task: JoinHandle<()>,
}

impl ChatRoom {
    /// `store` must act as `reader`
    pub fn open(
        store: Arc<dyn DocumentStore>,
        conversation_id: &str,
        reader: &str,
    ) -> Result<Self, MarketError> {
        let path = conversation_path(conversation_id)?;
        let conversation = Arc::new(SharedState::new(None));
        let messages = Arc::new(SharedState::new(Vec::new()));
        let counterpart = Arc::new(SharedState::new(None));

        let mut conversation_sub = store.subscribe(Watch::Document(path));
        let mut messages_sub = store.subscribe(Watch::Query(messages_query(conversation_id)));

        let task = tokio::spawn({
            let conversation = conversation.clone();
            let messages = messages.clone();
            let counterpart = counterpart.clone();
            let reader = reader.to_string();
            let id = conversation_id.to_string();

            async move {
                loop {
                    tokio::select! {
                        item = conversation_sub.next() => {
                            let Some(item) = item else { break };
                            match item {
                                Ok(snapshot) => {
                                    let record = snapshot
                                        .into_documents()
                                        .first()
                                        .and_then(|doc| doc.decode::<ConversationRecord>().ok());
                                    if let Some(record) = &record {
                                        refresh_counterpart(store.as_ref(), record, &reader, &counterpart)
                                            .await;
                                        if let Err(e) =
                                            mark_read(store.as_ref(), record, &reader).await
                                        {
                                            warn!("Failed to mark {} read: {}", id, e);
                                        }
                                    }
                                    conversation.replace(record);
                                }
                                Err(e) => warn!("Conversation {} feed error: {}", id, e),
                            }
                        }
                        item = messages_sub.next() => {
                            let Some(item) = item else { break };
                            match item {
                                Ok(snapshot) => {
                                    let docs = snapshot.into_documents();
                                    messages.replace(decode_all::<ChatMessage>(&docs));
                                }
                                Err(e) => warn!("Messages {} feed error: {}", id, e),
                            }
                        }
                    }
                }
                debug!("Chat room {} closed", id);
            }
        });

        Ok(Self {
            id: conversation_id.to_string(),
            conversation,
            messages,
            counterpart,
            task,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn conversation(&self) -> watch::Receiver<Option<ConversationRecord>> {
        self.conversation.subscribe()
    }

    pub fn messages(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.messages.subscribe()
    }

    pub fn counterpart(&self) -> watch::Receiver<Option<User>> {
        self.counterpart.subscribe()
    }
}

impl Drop for ChatRoom {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn refresh_counterpart(
    store: &dyn DocumentStore,
    record: &ConversationRecord,
    reader: &str,
    counterpart: &SharedState<Option<User>>,
) {
    let Some(other) = record.counterpart(reader) else {
        return;
    };
    if counterpart.get().is_some_and(|user| user.id == other) {
        return;
    }

    let Ok(path) = DocPath::new(USERS, other) else {
        return;
    };
    match store.get(&path).await {
        Ok(Some(doc)) => match doc.decode::<User>() {
            Ok(user) => {
                counterpart.replace(Some(user));
            }
            Err(e) => warn!("Malformed profile {}: {}", path, e),
        },
        Ok(None) => debug!("No profile for {}", other),
        Err(e) => warn!("Failed to load profile {}: {}", path, e),
    }
}
