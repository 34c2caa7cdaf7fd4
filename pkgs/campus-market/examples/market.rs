//! Two students on one local store: list an item, chat about it, try to
//! touch someone else's ad, then mark your own as sold.
//!
//! Run with: cargo run -p campus-market --example market -- --data-dir /tmp/campus
//!
//! Set RUST_LOG=campus_market=debug for the sync layer's logs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use campus_auth::AuthManager;
use campus_market::{
    ListingDraft, MarketClient, MarketConfig, MarketEvent, RegistrationForm, StatusChange,
};
use campus_services::{ImageFile, ImageUploader, ListingCopywriter, UploadError};
use campus_store::{MarketRules, SqliteDocumentStore};
use clap::Parser;
use futures::channel::mpsc::UnboundedReceiver;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "market")]
#[command(about = "Campus Market walkthrough on a local store", long_about = None)]
struct Args {
    /// Directory for the databases and uploaded images
    #[arg(short, long, default_value = "campus-demo")]
    data_dir: PathBuf,

    /// Item to list
    #[arg(short, long, default_value = "Desk Lamp")]
    title: String,

    /// Asking price
    #[arg(short, long, default_value = "2500")]
    price: String,
}

/// Copies images into a local directory and hands out file URLs
struct DirectoryUploader {
    root: PathBuf,
}

#[async_trait]
impl ImageUploader for DirectoryUploader {
    async fn upload(&self, file: &ImageFile) -> Result<String, UploadError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let target = self
            .root
            .join(format!("{}-{}", uuid::Uuid::new_v4().simple(), file.file_name));
        tokio::fs::write(&target, &file.bytes).await?;
        Ok(format!("file://{}", target.display()))
    }
}

fn print_events(who: &str, events: &mut UnboundedReceiver<MarketEvent>) {
    while let Ok(Some(event)) = events.try_next() {
        match event {
            MarketEvent::Notification(n) => println!("  [{}] {:?}: {}", who, n.kind, n.message),
            MarketEvent::UploadProgress(step) => println!("  [{}] {}", who, step.message()),
            MarketEvent::SessionChanged(Some(user)) => println!("  [{}] signed in as {}", who, user.name),
            MarketEvent::SessionChanged(None) => println!("  [{}] signed out", who),
        }
    }
}

async fn student(
    args: &Args,
    store: Arc<SqliteDocumentStore>,
    name: &str,
    email: &str,
) -> Result<(MarketClient, UnboundedReceiver<MarketEvent>)> {
    let auth = AuthManager::open(args.data_dir.join(format!("{}-accounts.db", name.to_lowercase())))
        .await
        .context("Failed to open accounts")?;
    let config = MarketConfig {
        data_dir: args.data_dir.clone(),
        ..MarketConfig::from_env()
    };
    let copywriter = ListingCopywriter::from_config(config.generation.clone());
    let uploader = DirectoryUploader {
        root: args.data_dir.join("uploads"),
    };

    let (client, events) = MarketClient::with_services(
        config,
        store,
        Arc::new(auth),
        Some(Arc::new(uploader)),
        copywriter,
    );

    let form = RegistrationForm {
        full_name: name.to_string(),
        email: email.to_string(),
        phone: "08000000000".to_string(),
        password: "campus-demo".to_string(),
        university: "UNILAG".to_string(),
        state: "Lagos".to_string(),
        ..Default::default()
    };
    if client.register(&form).await.is_err() {
        client.sign_in(email, &form.password).await?;
    }

    Ok((client, events))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let args = Args::parse();
    tokio::fs::create_dir_all(&args.data_dir)
        .await
        .context("Failed to create data directory")?;

    let store = Arc::new(
        SqliteDocumentStore::open(args.data_dir.join("documents.db"), Arc::new(MarketRules))
            .await?,
    );

    let (ada, mut ada_events) = student(&args, store.clone(), "Ada", "ada@uni.edu").await?;
    let (tunde, mut tunde_events) = student(&args, store, "Tunde", "tunde@uni.edu").await?;
    print_events("ada", &mut ada_events);
    print_events("tunde", &mut tunde_events);

    println!("\nAda lists '{}'", args.title);
    let mut draft = ListingDraft::new(&args.title, &args.price, "Furniture");
    draft.description = ada.generate_description(&draft).await?;
    draft.images = vec![ImageFile::from_bytes("photo.jpg", b"not really a jpeg".to_vec())];
    let product = ada.post_listing(&draft).await?;
    print_events("ada", &mut ada_events);
    println!("{}", product.description);

    println!("\nTunde asks about it");
    let chat = tunde.contact_seller(&product).await?;
    tunde.send_text(chat.as_str(), "Is this still available?").await?;
    let buyer = tunde.current_user().context("Tunde is not signed in")?;
    let from_seller = ada.open_conversation(&buyer, Some(&product)).await?;
    println!("  [ada] same conversation: {}", from_seller == chat);
    if let Err(e) = ada.open_conversation(&product.seller, None).await {
        println!("  [ada] {}", e.user_message());
    }
    for conversation in ada.conversations().await? {
        println!(
            "  [ada] {} unread: {}",
            conversation.preview(),
            conversation.unread_for(&product.seller.id)
        );
    }

    println!("\nTunde tries to mark Ada's listing as sold");
    let outcome = tunde
        .update_product_status(&product.id, StatusChange::MarkSold)
        .await;
    print_events("tunde", &mut tunde_events);
    println!("  committed: {}", outcome.is_committed());

    println!("\nAda marks it as sold");
    let outcome = ada
        .update_product_status(&product.id, StatusChange::MarkSold)
        .await;
    print_events("ada", &mut ada_events);
    println!("  committed: {}", outcome.is_committed());

    ada.sign_out().await;
    tunde.sign_out().await;
    print_events("ada", &mut ada_events);
    print_events("tunde", &mut tunde_events);

    Ok(())
}
