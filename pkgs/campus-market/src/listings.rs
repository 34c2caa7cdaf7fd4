//! Posting listings and browsing the catalog

use campus_services::{ImageFile, ImageUploader, ListingBrief};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Condition, Product, ProductStatus, User};
use crate::{MarketConfig, MarketError};

pub const PRODUCTS: &str = "products";

const DEFAULT_DESCRIPTION: &str = "No description provided.";
const DEFAULT_NOTES: &str = "Reliable, good condition, priced to sell. Perfect for students.";

/// Sell form as filled in by the seller
#[derive(Debug, Clone)]
pub struct ListingDraft {
    pub title: String,
    /// Raw text from the price field
    pub price: String,
    pub category: String,
    pub condition: Condition,
    pub description: String,
    pub location: String,
    pub is_negotiable: bool,
    pub images: Vec<ImageFile>,
}

impl ListingDraft {
    pub fn new(title: impl Into<String>, price: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            price: price.into(),
            category: category.into(),
            condition: Condition::Used,
            description: String::new(),
            location: String::new(),
            is_negotiable: false,
            images: Vec::new(),
        }
    }

    /// Check the form before anything is uploaded; returns the parsed price
    pub fn validate(&self) -> Result<f64, MarketError> {
        if self.title.trim().is_empty()
            || self.price.trim().is_empty()
            || self.category.trim().is_empty()
        {
            return Err(MarketError::validation("Please fill in required fields"));
        }

        let price = self
            .price
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite() && *p >= 0.0)
            .ok_or_else(|| MarketError::validation("Please enter a valid price."))?;

        if self.images.is_empty() {
            return Err(MarketError::validation("Please upload at least one image"));
        }

        Ok(price)
    }

    /// Brief for the description writer; the description field doubles as
    /// the seller's notes
    pub fn brief(&self) -> Result<ListingBrief, MarketError> {
        if self.title.trim().is_empty() || self.category.trim().is_empty() {
            return Err(MarketError::validation(
                "Please enter a title and category first!",
            ));
        }

        let notes = if self.description.trim().is_empty() {
            DEFAULT_NOTES.to_string()
        } else {
            self.description.clone()
        };

        Ok(ListingBrief {
            title: self.title.clone(),
            category: self.category.clone(),
            condition: self.condition.to_string(),
            notes,
        })
    }
}

/// Progress of a multi-image upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    /// 1-based index of the image being uploaded
    pub current: usize,
    pub total: usize,
}

impl UploadProgress {
    pub fn message(&self) -> String {
        format!("Uploading photo {} of {}...", self.current, self.total)
    }
}

/// Upload images one at a time, in order. Stops at the first failure.
pub async fn upload_images(
    uploader: &dyn ImageUploader,
    images: &[ImageFile],
    mut progress: impl FnMut(UploadProgress),
) -> Result<Vec<String>, MarketError> {
    let mut urls = Vec::with_capacity(images.len());

    for (index, image) in images.iter().enumerate() {
        let step = UploadProgress {
            current: index + 1,
            total: images.len(),
        };
        debug!("{}", step.message());
        progress(step);

        urls.push(uploader.upload(image).await?);
    }

    info!("Uploaded {} images", urls.len());
    Ok(urls)
}

/// Assemble the product document for a validated draft
pub fn build_product(
    draft: &ListingDraft,
    price: f64,
    images: Vec<String>,
    seller: &User,
    config: &MarketConfig,
    now: DateTime<Utc>,
) -> Product {
    let description = if draft.description.trim().is_empty() {
        DEFAULT_DESCRIPTION.to_string()
    } else {
        draft.description.clone()
    };
    let location = if draft.location.trim().is_empty() {
        config.default_location.clone()
    } else {
        draft.location.clone()
    };

    Product {
        id: Uuid::new_v4().simple().to_string(),
        title: draft.title.trim().to_string(),
        price,
        currency: config.currency.clone(),
        category: draft.category.clone(),
        condition: draft.condition,
        description,
        images,
        location,
        posted_date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        seller: seller.clone(),
        views: 0,
        is_featured: false,
        is_negotiable: draft.is_negotiable,
        status: Some(ProductStatus::Active),
    }
}

fn newest_first<'a>(mut products: Vec<&'a Product>) -> Vec<&'a Product> {
    products.sort_by(|a, b| b.posted_date.cmp(&a.posted_date));
    products
}

/// Listings visible in the catalog, newest first
pub fn active_listings(products: &[Product]) -> Vec<&Product> {
    newest_first(products.iter().filter(|p| p.is_active()).collect())
}

/// Case-insensitive match on title, description or category
pub fn search<'a>(products: &'a [Product], query: &str) -> Vec<&'a Product> {
    let needle = query.trim().to_lowercase();
    newest_first(
        products
            .iter()
            .filter(|p| p.is_active())
            .filter(|p| {
                p.title.to_lowercase().contains(&needle)
                    || p.description.to_lowercase().contains(&needle)
                    || p.category.to_lowercase().contains(&needle)
            })
            .collect(),
    )
}

pub fn in_category<'a>(products: &'a [Product], category: &str) -> Vec<&'a Product> {
    newest_first(
        products
            .iter()
            .filter(|p| p.is_active() && p.category == category)
            .collect(),
    )
}

/// A seller's public shop: their active listings
pub fn seller_listings<'a>(products: &'a [Product], seller_id: &str) -> Vec<&'a Product> {
    newest_first(
        products
            .iter()
            .filter(|p| p.is_active() && p.seller.id == seller_id)
            .collect(),
    )
}

/// Everything the signed-in user has posted, sold items included
pub fn my_ads<'a>(products: &'a [Product], user_id: &str) -> Vec<&'a Product> {
    newest_first(
        products
            .iter()
            .filter(|p| p.seller.id == user_id)
            .collect(),
    )
}
