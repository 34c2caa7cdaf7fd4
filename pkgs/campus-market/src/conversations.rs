//! Conversations and messages
//!
//! Conversations are found or created under their relation id, so both
//! sides of a chat about one listing end up in the same record.

use campus_store::{increment, Direction, DocPath, Document, DocumentStore, Query};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    ChatMessage, ConversationRecord, MessageKind, ParticipantDetails, Product, User,
};
use crate::relation::{resolve_relation_id, RelationId};
use crate::MarketError;

pub const CONVERSATIONS: &str = "conversations";
pub const MESSAGES: &str = "messages";

const IMAGE_PREVIEW: &str = "Sent an image";

pub fn conversation_path(id: &str) -> Result<DocPath, MarketError> {
    DocPath::new(CONVERSATIONS, id).map_err(|e| MarketError::InvalidArgument(e.to_string()))
}

/// Collection holding the messages of conversation `id`
pub fn messages_collection(id: &str) -> String {
    format!("{}/{}/{}", CONVERSATIONS, id, MESSAGES)
}

/// A fresh record: metadata snapshots, zero unread counters, empty preview
pub fn new_conversation(
    id: &RelationId,
    me: &User,
    counterpart: &User,
    product: Option<&Product>,
    now: DateTime<Utc>,
) -> ConversationRecord {
    let participant_details = BTreeMap::from([
        (me.id.clone(), ParticipantDetails::from(me)),
        (counterpart.id.clone(), ParticipantDetails::from(counterpart)),
    ]);
    let unread_counts = BTreeMap::from([(me.id.clone(), 0), (counterpart.id.clone(), 0)]);

    ConversationRecord {
        id: id.to_string(),
        participants: vec![me.id.clone(), counterpart.id.clone()],
        participant_details,
        product_id: product.map(|p| p.id.clone()),
        product_title: product.map(|p| p.title.clone()),
        product_price: product.map(|p| p.price),
        product_image: product.map(|p| p.images.first().cloned().unwrap_or_default()),
        last_message: String::new(),
        last_message_time: Some(now),
        unread_counts,
        created_at: Some(now),
    }
}

/// Find the conversation between `me` and `counterpart` about `product`,
/// creating it if it does not exist yet.
///
/// A denied read is treated as "not found": the store refuses reads of
/// conversations that do not exist. Two callers racing through here both
/// write the same key and the last write wins.
pub async fn open_conversation(
    store: &dyn DocumentStore,
    me: &User,
    counterpart: &User,
    product: Option<&Product>,
) -> Result<RelationId, MarketError> {
    let id = resolve_relation_id(&me.id, &counterpart.id, product.map(|p| p.id.as_str()))?;
    let path = conversation_path(id.as_str())?;

    let exists = match store.get(&path).await {
        Ok(doc) => doc.is_some(),
        Err(e) if e.is_permission_denied() => {
            debug!("Read of {} denied, treating as absent", path);
            false
        }
        Err(e) => return Err(MarketError::LookupFailed(e)),
    };

    if !exists {
        let record = new_conversation(&id, me, counterpart, product, Utc::now());
        store.set(&path, serde_json::to_value(&record)?).await?;
        info!("Created conversation {}", id);
    }

    Ok(id)
}

/// Message content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    /// URL of an uploaded image
    Image(String),
}

pub async fn load_conversation(
    store: &dyn DocumentStore,
    id: &str,
) -> Result<ConversationRecord, MarketError> {
    let path = conversation_path(id)?;
    store
        .get(&path)
        .await?
        .ok_or_else(|| MarketError::InvalidArgument(format!("no conversation {}", id)))?
        .decode::<ConversationRecord>()
        .map_err(MarketError::from)
}

/// Append a message and update the conversation preview, timestamp and the
/// counterpart's unread counter
pub async fn send_message(
    store: &dyn DocumentStore,
    conversation_id: &str,
    sender: &User,
    body: MessageBody,
) -> Result<ChatMessage, MarketError> {
    let (text, image, kind, preview) = match body {
        MessageBody::Text(text) => {
            let text = text.trim().to_string();
            if text.is_empty() {
                return Err(MarketError::validation("Message cannot be empty"));
            }
            let preview = text.clone();
            (text, None, MessageKind::Text, preview)
        }
        MessageBody::Image(url) => (
            String::new(),
            Some(url),
            MessageKind::Image,
            IMAGE_PREVIEW.to_string(),
        ),
    };

    let conversation = load_conversation(store, conversation_id).await?;
    let path = conversation_path(conversation_id)?;

    let now = Utc::now();
    let message = ChatMessage {
        id: Uuid::new_v4().simple().to_string(),
        sender_id: sender.id.clone(),
        text,
        image,
        created_at: now,
        kind,
    };

    let message_path = path.child(MESSAGES, message.id.clone())?;
    store
        .set(&message_path, serde_json::to_value(&message)?)
        .await?;

    let mut partial = Map::new();
    partial.insert("lastMessage".into(), Value::String(preview));
    partial.insert("lastMessageTime".into(), json!(now.timestamp_millis()));
    if let Some(other) = conversation.counterpart(&sender.id) {
        partial.insert(format!("unreadCounts.{}", other), increment(1));
    }
    store.update(&path, partial).await?;

    debug!("Sent message {} in {}", message.id, conversation_id);
    Ok(message)
}

/// Reset `reader`'s unread counter if it is non-zero. Returns whether a
/// write was made.
pub async fn mark_read(
    store: &dyn DocumentStore,
    conversation: &ConversationRecord,
    reader: &str,
) -> Result<bool, MarketError> {
    if conversation.unread_for(reader) == 0 {
        return Ok(false);
    }

    let mut partial = Map::new();
    partial.insert(format!("unreadCounts.{}", reader), json!(0));
    store
        .update(&conversation_path(&conversation.id)?, partial)
        .await?;

    debug!("Marked {} read for {}", conversation.id, reader);
    Ok(true)
}

pub fn conversations_query(uid: &str) -> Query {
    Query::collection(CONVERSATIONS).where_array_contains("participants", uid)
}

pub fn messages_query(conversation_id: &str) -> Query {
    Query::collection(messages_collection(conversation_id))
        .order_by("createdAt", Direction::Ascending)
}

/// Decode documents, skipping any that do not parse
pub fn decode_all<T: serde::de::DeserializeOwned>(docs: &[Document]) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match doc.decode::<T>() {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Skipping malformed document {}: {}", doc.path, e);
                None
            }
        })
        .collect()
}

/// Newest activity first; a conversation without a timestamp counts as `now`
pub fn sort_conversations(records: &mut [ConversationRecord], now: DateTime<Utc>) {
    records.sort_by(|a, b| {
        let a = a.last_message_time.unwrap_or(now);
        let b = b.last_message_time.unwrap_or(now);
        b.cmp(&a)
    });
}

/// Conversations `uid` takes part in, newest first
pub async fn list_conversations(
    store: &dyn DocumentStore,
    uid: &str,
) -> Result<Vec<ConversationRecord>, MarketError> {
    let docs = store.query(&conversations_query(uid)).await?;
    let mut records = decode_all::<ConversationRecord>(&docs);
    sort_conversations(&mut records, Utc::now());
    Ok(records)
}

pub fn total_unread(records: &[ConversationRecord], uid: &str) -> u32 {
    records.iter().map(|r| r.unread_for(uid)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(id: &str, time: Option<DateTime<Utc>>, unread: u32) -> ConversationRecord {
        ConversationRecord {
            id: id.to_string(),
            participants: vec!["alice".into(), "bob".into()],
            participant_details: BTreeMap::new(),
            product_id: None,
            product_title: None,
            product_price: None,
            product_image: None,
            last_message: String::new(),
            last_message_time: time,
            unread_counts: BTreeMap::from([("alice".to_string(), unread)]),
            created_at: None,
        }
    }

    #[test]
    fn test_sort_newest_first_with_pending_as_now() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let mut records = vec![
            record("old", Some(now - Duration::days(2)), 0),
            record("pending", None, 0),
            record("recent", Some(now - Duration::minutes(5)), 0),
        ];
        sort_conversations(&mut records, now);

        let order: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["pending", "recent", "old"]);
    }

    #[test]
    fn test_total_unread() {
        let records = vec![record("a", None, 2), record("b", None, 0), record("c", None, 3)];
        assert_eq!(total_unread(&records, "alice"), 5);
        assert_eq!(total_unread(&records, "bob"), 0);
    }

    #[test]
    fn test_messages_collection() {
        assert_eq!(
            messages_collection("alice~bob~p1"),
            "conversations/alice~bob~p1/messages"
        );
    }
}
