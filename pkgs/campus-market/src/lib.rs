//! Campus Market - client sync layer for a student marketplace
//!
//! # Architecture
//!
//! - **relation**: Deterministic conversation ids derived from the two
//!   participants and the listing, so repeated "message seller" taps land in
//!   one record
//! - **conversations**: Lookup-or-create, messages, unread counters
//! - **optimistic**: Apply a change locally, write it remotely, roll back to
//!   the exact prior value if the write fails
//! - **feeds**: Store subscriptions replacing application state snapshot by
//!   snapshot
//! - **listings** / **profile**: Sell and sign-up forms, catalog views
//! - **client**: [`MarketClient`], owning the application state and emitting
//!   [`MarketEvent`]s
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use campus_market::{MarketClient, MarketConfig, StatusChange};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let (client, _events) = MarketClient::open(MarketConfig::from_env()).await?;
//! client.sign_in("ada@uni.edu", "secret1").await?;
//!
//! if let Some(product) = client.products().first() {
//!     let chat_id = client.contact_seller(product).await?;
//!     client.send_text(chat_id.as_str(), "Is this still available?").await?;
//! }
//!
//! let outcome = client.update_product_status("p1", StatusChange::MarkSold).await;
//! println!("{}", outcome.notification().message);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod conversations;
pub mod display;
pub mod error;
pub mod feeds;
pub mod listings;
pub mod models;
pub mod notify;
pub mod optimistic;
pub mod profile;
pub mod relation;

pub use client::{MarketClient, MarketEvent, StatusChange};
pub use config::MarketConfig;
pub use conversations::{open_conversation, MessageBody};
pub use error::MarketError;
pub use feeds::{ChatRoom, Feed};
pub use listings::{ListingDraft, UploadProgress};
pub use models::{
    ChatMessage, Condition, ConversationRecord, MessageKind, ParticipantDetails, Product,
    ProductStatus, User,
};
pub use notify::{Notification, NotificationKind};
pub use optimistic::{apply_optimistic, MutationNotices, Outcome, SharedState};
pub use profile::RegistrationForm;
pub use relation::{resolve_relation_id, RelationId};
