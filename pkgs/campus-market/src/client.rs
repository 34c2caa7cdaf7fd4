//! Marketplace client facade

use anyhow::{Context, Result};
use campus_auth::{AuthManager, PasswordReset};
use campus_services::{CloudinaryUploader, ImageFile, ImageUploader, ListingCopywriter, UploadError};
use campus_store::{DocPath, DocumentStore, MarketRules, SqliteDocumentStore, StoreError};
use chrono::Utc;
use futures::channel::mpsc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, instrument, warn};

use crate::conversations::{self, MessageBody};
use crate::feeds::{products_feed, unread_feed, ChatRoom, Feed};
use crate::listings::{build_product, upload_images, ListingDraft, UploadProgress, PRODUCTS};
use crate::models::{ChatMessage, ConversationRecord, Product, ProductStatus, User};
use crate::notify::Notification;
use crate::optimistic::{apply_optimistic, MutationNotices, Outcome, SharedState};
use crate::profile::{fallback_profile, RegistrationForm, USERS};
use crate::relation::RelationId;
use crate::{MarketConfig, MarketError};

/// Events for the UI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEvent {
    Notification(Notification),
    UploadProgress(UploadProgress),
    /// Signed-in profile, `None` after sign-out
    SessionChanged(Option<User>),
}

/// Lifecycle changes a seller can make to a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    MarkSold,
    Delete,
}

/// Application state and entry points of the marketplace client
pub struct MarketClient {
    config: MarketConfig,
    store: Arc<dyn DocumentStore>,
    auth: Arc<AuthManager>,
    uploader: Option<Arc<dyn ImageUploader>>,
    copywriter: ListingCopywriter,

    products: Arc<SharedState<Vec<Product>>>,
    current_user: Arc<SharedState<Option<User>>>,
    unread: Arc<SharedState<u32>>,

    _products_feed: Feed,
    session_feed: Mutex<Option<Feed>>,

    event_sender: mpsc::UnboundedSender<MarketEvent>,
}

impl MarketClient {
    /// Open the local stores under `config.data_dir` and connect the
    /// configured services
    #[instrument(skip(config), fields(data_dir = %config.data_dir.display()))]
    pub async fn open(
        config: MarketConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<MarketEvent>)> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .context("Failed to create data directory")?;

        let store = SqliteDocumentStore::open(config.documents_db(), Arc::new(MarketRules))
            .await
            .context("Failed to open document store")?;
        let auth = AuthManager::open(config.accounts_db())
            .await
            .context("Failed to open auth manager")?;

        let uploader = match config.upload.clone() {
            Some(upload) => Some(Arc::new(
                CloudinaryUploader::new(upload).context("Invalid upload configuration")?,
            ) as Arc<dyn ImageUploader>),
            None => None,
        };
        let copywriter = ListingCopywriter::from_config(config.generation.clone());

        info!("Market client opened");
        Ok(Self::with_services(
            config,
            Arc::new(store),
            Arc::new(auth),
            uploader,
            copywriter,
        ))
    }

    /// Assemble a client from already constructed services. `store` is the
    /// anonymous handle; the client scopes it to the signed-in account.
    pub fn with_services(
        config: MarketConfig,
        store: Arc<dyn DocumentStore>,
        auth: Arc<AuthManager>,
        uploader: Option<Arc<dyn ImageUploader>>,
        copywriter: ListingCopywriter,
    ) -> (Self, mpsc::UnboundedReceiver<MarketEvent>) {
        let (event_sender, event_receiver) = mpsc::unbounded();

        let products = Arc::new(SharedState::new(Vec::new()));
        let products_feed = products_feed(store.as_ref(), products.clone());

        let client = Self {
            config,
            store,
            auth,
            uploader,
            copywriter,
            products,
            current_user: Arc::new(SharedState::new(None)),
            unread: Arc::new(SharedState::new(0)),
            _products_feed: products_feed,
            session_feed: Mutex::new(None),
            event_sender,
        };

        (client, event_receiver)
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub fn products(&self) -> Vec<Product> {
        self.products.get()
    }

    pub fn watch_products(&self) -> watch::Receiver<Vec<Product>> {
        self.products.subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.current_user.get()
    }

    pub fn watch_current_user(&self) -> watch::Receiver<Option<User>> {
        self.current_user.subscribe()
    }

    pub fn unread_count(&self) -> u32 {
        self.unread.get()
    }

    pub fn watch_unread(&self) -> watch::Receiver<u32> {
        self.unread.subscribe()
    }

    /// Send event to event receiver
    fn send_event(&self, event: MarketEvent) {
        if let Err(e) = self.event_sender.unbounded_send(event) {
            error!("Failed to send market event: {}", e);
        }
    }

    fn notify(&self, notification: &Notification) {
        self.send_event(MarketEvent::Notification(notification.clone()));
    }

    /// Store handle acting as the signed-in account (anonymous otherwise)
    fn session_store(&self) -> Arc<dyn DocumentStore> {
        let uid = self.auth.current_session().map(|s| s.uid);
        self.store.scoped(uid.as_deref())
    }

    fn require_user(&self) -> Result<User, MarketError> {
        self.current_user.get().ok_or(MarketError::NotSignedIn)
    }

    // Session

    /// Create an account and its profile document, then sign in
    pub async fn register(&self, form: &RegistrationForm) -> Result<User, MarketError> {
        form.validate_account_step()?;

        let session = self.auth.sign_up(&form.email, &form.password).await?;
        let profile = form.profile(&session.uid, Utc::now());

        let path = DocPath::new(USERS, session.uid.as_str())?;
        self.session_store()
            .set(&path, serde_json::to_value(&profile)?)
            .await?;

        info!("Registered {}", session.uid);
        self.start_session(profile.clone()).await;
        Ok(profile)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, MarketError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(MarketError::validation("Please fill in all fields."));
        }

        let session = self.auth.sign_in(email, password).await?;

        let path = DocPath::new(USERS, session.uid.as_str())?;
        let profile = match self.session_store().get(&path).await {
            Ok(Some(doc)) => doc.decode::<User>().unwrap_or_else(|e| {
                warn!("Malformed profile for {}: {}", session.uid, e);
                fallback_profile(&session)
            }),
            Ok(None) => fallback_profile(&session),
            Err(e) => {
                warn!("Failed to load profile for {}: {}", session.uid, e);
                fallback_profile(&session)
            }
        };

        self.start_session(profile.clone()).await;
        Ok(profile)
    }

    async fn start_session(&self, profile: User) {
        let feed = unread_feed(
            self.session_store().as_ref(),
            &profile.id,
            self.unread.clone(),
        );
        *self.session_feed.lock().await = Some(feed);

        self.current_user.replace(Some(profile.clone()));
        self.send_event(MarketEvent::SessionChanged(Some(profile)));
    }

    /// Sign out and clear everything tied to the session
    pub async fn sign_out(&self) {
        self.auth.sign_out();
        self.session_feed.lock().await.take();
        self.current_user.replace(None);
        self.unread.replace(0);
        self.send_event(MarketEvent::SessionChanged(None));
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<PasswordReset, MarketError> {
        if email.trim().is_empty() {
            return Err(MarketError::validation("Please enter your email."));
        }
        Ok(self.auth.send_password_reset(email).await?)
    }

    // Profile

    /// Show `updated` immediately and persist it; the previous profile is
    /// restored if the write fails
    pub async fn update_profile(&self, updated: User) -> Result<Outcome<()>, MarketError> {
        let current = self.require_user()?;
        if updated.id != current.id {
            return Err(MarketError::InvalidArgument(
                "profile id cannot change".to_string(),
            ));
        }

        let store = self.session_store();
        let path = DocPath::new(USERS, current.id.as_str())?;
        let notices = MutationNotices::new(
            "Profile updated successfully",
            "Permission denied: You can only edit your own profile.",
            "Failed to update profile",
        );

        let fields = profile_fields(&updated);
        let outcome = apply_optimistic(
            &*self.current_user,
            |user| *user = Some(updated),
            async {
                store.update(&path, fields?).await?;
                Ok::<(), MarketError>(())
            },
            &notices,
        )
        .await;

        self.notify(outcome.notification());
        Ok(outcome)
    }

    /// Upload a new avatar image and return its URL
    pub async fn upload_avatar(&self, file: &ImageFile) -> Result<String, MarketError> {
        let uploader = self.uploader()?;
        Ok(uploader.upload(file).await?)
    }

    // Listings

    fn uploader(&self) -> Result<&Arc<dyn ImageUploader>, MarketError> {
        self.uploader.as_ref().ok_or_else(|| {
            MarketError::UploadFailed(UploadError::MissingConfiguration(
                "no upload service configured".to_string(),
            ))
        })
    }

    /// Description for the draft; falls back to a template when the text
    /// service is missing or fails
    pub async fn generate_description(&self, draft: &ListingDraft) -> Result<String, MarketError> {
        let brief = draft.brief()?;
        Ok(self.copywriter.describe(&brief).await)
    }

    /// Validate, upload the images in order and publish the listing
    pub async fn post_listing(&self, draft: &ListingDraft) -> Result<Product, MarketError> {
        let seller = self.require_user()?;
        let price = draft.validate()?;
        let uploader = self.uploader()?;

        let images = upload_images(uploader.as_ref(), &draft.images, |step| {
            self.send_event(MarketEvent::UploadProgress(step));
        })
        .await?;

        let product = build_product(draft, price, images, &seller, &self.config, Utc::now());
        let path = DocPath::new(PRODUCTS, product.id.as_str())?;
        self.session_store()
            .set(&path, serde_json::to_value(&product)?)
            .await?;

        info!("Posted listing {}", product.id);
        Ok(product)
    }

    /// Mark a listing sold or remove it, optimistically
    pub async fn update_product_status(
        &self,
        product_id: &str,
        change: StatusChange,
    ) -> Outcome<()> {
        let store = self.session_store();
        let notices = MutationNotices::new(
            match change {
                StatusChange::MarkSold => "Marked as sold",
                StatusChange::Delete => "Ad deleted successfully",
            },
            "Permission denied: You can only edit your own ads.",
            "Action failed: {error}",
        );

        let outcome = apply_optimistic(
            &*self.products,
            |products| match change {
                StatusChange::Delete => products.retain(|p| p.id != product_id),
                StatusChange::MarkSold => products
                    .iter_mut()
                    .filter(|p| p.id == product_id)
                    .for_each(|p| p.status = Some(ProductStatus::Sold)),
            },
            async {
                let path = DocPath::new(PRODUCTS, product_id)?;
                match change {
                    StatusChange::Delete => store.delete(&path).await?,
                    StatusChange::MarkSold => {
                        let mut partial = Map::new();
                        partial.insert("status".into(), json!("sold"));
                        store.update(&path, partial).await?
                    }
                }
                Ok::<(), StoreError>(())
            },
            &notices,
        )
        .await;

        self.notify(outcome.notification());
        outcome
    }

    // Conversations

    /// Find or create the conversation with `counterpart`, optionally about
    /// one listing
    pub async fn open_conversation(
        &self,
        counterpart: &User,
        product: Option<&Product>,
    ) -> Result<RelationId, MarketError> {
        let me = self.require_user()?;
        if me.id == counterpart.id {
            return Err(MarketError::validation("You cannot chat with yourself."));
        }
        conversations::open_conversation(self.session_store().as_ref(), &me, counterpart, product)
            .await
    }

    /// Start (or resume) a chat with the seller of `product`
    pub async fn contact_seller(&self, product: &Product) -> Result<RelationId, MarketError> {
        self.open_conversation(&product.seller, Some(product)).await
    }

    pub async fn send_text(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<ChatMessage, MarketError> {
        let me = self.require_user()?;
        conversations::send_message(
            self.session_store().as_ref(),
            conversation_id,
            &me,
            MessageBody::Text(text.to_string()),
        )
        .await
    }

    /// Upload `file` and send it as an image message
    pub async fn send_image(
        &self,
        conversation_id: &str,
        file: &ImageFile,
    ) -> Result<ChatMessage, MarketError> {
        let me = self.require_user()?;
        let url = self.uploader()?.upload(file).await?;
        conversations::send_message(
            self.session_store().as_ref(),
            conversation_id,
            &me,
            MessageBody::Image(url),
        )
        .await
    }

    /// Conversations of the signed-in user, newest first
    pub async fn conversations(&self) -> Result<Vec<ConversationRecord>, MarketError> {
        let me = self.require_user()?;
        conversations::list_conversations(self.session_store().as_ref(), &me.id).await
    }

    pub async fn mark_read(&self, conversation_id: &str) -> Result<bool, MarketError> {
        let me = self.require_user()?;
        let store = self.session_store();
        let record = conversations::load_conversation(store.as_ref(), conversation_id).await?;
        conversations::mark_read(store.as_ref(), &record, &me.id).await
    }

    /// Live view of one conversation for the signed-in user
    pub fn open_chat_room(&self, conversation_id: &str) -> Result<ChatRoom, MarketError> {
        let me = self.require_user()?;
        ChatRoom::open(self.session_store(), conversation_id, &me.id)
    }
}

/// Partial update for a profile; cleared optional fields are written as null
fn profile_fields(user: &User) -> Result<Map<String, Value>, MarketError> {
    let mut fields = match serde_json::to_value(user)? {
        Value::Object(fields) => fields,
        _ => {
            return Err(MarketError::InvalidArgument(
                "profile must serialize to an object".to_string(),
            ))
        }
    };
    let optional = [
        ("university", &user.university),
        ("department", &user.department),
        ("bio", &user.bio),
        ("phone", &user.phone),
        ("email", &user.email),
        ("state", &user.state),
    ];
    for (key, value) in optional {
        if value.is_none() {
            fields.insert(key.to_string(), Value::Null);
        }
    }
    Ok(fields)
}
