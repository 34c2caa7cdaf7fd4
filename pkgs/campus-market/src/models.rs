//! Documents exchanged with the store
//!
//! Field names on the wire are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Public profile stored at `users/{uid}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub joined_date: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    New,
    Used,
    Refurbished,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Condition::New => "New",
            Condition::Used => "Used",
            Condition::Refurbished => "Refurbished",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Sold,
}

/// Listing stored at `products/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub price: f64,
    pub currency: String,
    pub category: String,
    pub condition: Condition,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub location: String,
    /// RFC 3339, millisecond precision, UTC
    pub posted_date: String,
    pub seller: User,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_negotiable: bool,
    /// Absent means active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
}

impl Product {
    pub fn status(&self) -> ProductStatus {
        self.status.unwrap_or(ProductStatus::Active)
    }

    pub fn is_active(&self) -> bool {
        self.status() == ProductStatus::Active
    }

    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.posted_date)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    }
}

/// Display data for one participant, captured when the conversation is created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantDetails {
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub university: String,
}

impl From<&User> for ParticipantDetails {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            avatar: user.avatar.clone(),
            university: user.university.clone().unwrap_or_default(),
        }
    }
}

/// Conversation stored at `conversations/{relation id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    #[serde(default)]
    pub id: String,
    pub participants: Vec<String>,
    #[serde(default)]
    pub participant_details: BTreeMap<String, ParticipantDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_image: Option<String>,
    #[serde(default)]
    pub last_message: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_message_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_counts: BTreeMap<String, u32>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ConversationRecord {
    /// The participant that is not `me`
    pub fn counterpart(&self, me: &str) -> Option<&str> {
        self.participants
            .iter()
            .map(String::as_str)
            .find(|id| *id != me)
    }

    pub fn unread_for(&self, uid: &str) -> u32 {
        self.unread_counts.get(uid).copied().unwrap_or(0)
    }

    pub fn details_for(&self, uid: &str) -> ParticipantDetails {
        self.participant_details
            .get(uid)
            .cloned()
            .unwrap_or_else(|| ParticipantDetails {
                name: "Unknown User".to_string(),
                ..Default::default()
            })
    }

    /// Preview line for the conversation list
    pub fn preview(&self) -> String {
        let message = if self.last_message.is_empty() {
            "Sent an image"
        } else {
            self.last_message.as_str()
        };

        match &self.product_title {
            Some(title) => format!("[{}] {}", title, message),
            None => message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
}

/// Message stored at `conversations/{id}/messages/{mid}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    pub sender_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_wire_format() {
        let product: Product = serde_json::from_value(json!({
            "title": "Desk",
            "price": 5000,
            "currency": "₦",
            "category": "Furniture",
            "condition": "Used",
            "postedDate": "2026-10-01T10:00:00.000Z",
            "seller": { "id": "alice", "name": "Alice" },
            "isNegotiable": true
        }))
        .unwrap();

        assert_eq!(product.status(), ProductStatus::Active);
        assert!(product.is_negotiable);
        assert_eq!(product.seller.rating, 0.0);
        assert!(product.posted_at().is_some());

        let value = serde_json::to_value(&product).unwrap();
        assert!(value.get("status").is_none());
        assert_eq!(value["seller"]["id"], "alice");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ProductStatus::Sold).unwrap(),
            json!("sold")
        );
    }

    #[test]
    fn test_conversation_helpers() {
        let record: ConversationRecord = serde_json::from_value(json!({
            "participants": ["alice", "bob"],
            "participantDetails": { "bob": { "name": "Bob" } },
            "productTitle": "Desk",
            "lastMessage": "",
            "lastMessageTime": 1_760_000_000_000i64,
            "unreadCounts": { "alice": 2 }
        }))
        .unwrap();

        assert_eq!(record.counterpart("alice"), Some("bob"));
        assert_eq!(record.unread_for("alice"), 2);
        assert_eq!(record.unread_for("bob"), 0);
        assert_eq!(record.details_for("bob").name, "Bob");
        assert_eq!(record.details_for("carol").name, "Unknown User");
        assert_eq!(record.preview(), "[Desk] Sent an image");
        assert!(record.last_message_time.is_some());
    }
}
