//! Client configuration

use campus_services::{GenerationConfig, UploadConfig};
use std::path::PathBuf;

/// Configuration for [`MarketClient`](crate::MarketClient)
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Directory holding `documents.db` and `accounts.db`
    pub data_dir: PathBuf,

    /// Currency tag stamped on new listings (default: ₦)
    pub currency: String,

    /// Location used when a listing leaves it blank (default: Campus)
    pub default_location: String,

    /// Image uploads; posting listings and image messages needs this
    pub upload: Option<UploadConfig>,

    /// Generated descriptions; templates are used without it
    pub generation: Option<GenerationConfig>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("campus-data"),
            currency: "₦".to_string(),
            default_location: "Campus".to_string(),
            upload: None,
            generation: None,
        }
    }
}

impl MarketConfig {
    /// Defaults overlaid with `CAMPUS_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = var("CAMPUS_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let (Some(cloud), Some(preset)) = (
            var("CAMPUS_CLOUDINARY_CLOUD"),
            var("CAMPUS_CLOUDINARY_PRESET"),
        ) {
            config.upload = Some(UploadConfig::new(cloud, preset));
        }

        if let Some(key) = var("CAMPUS_GEMINI_KEY") {
            let mut generation = GenerationConfig::new(key);
            if let Some(model) = var("CAMPUS_GEMINI_MODEL") {
                generation = generation.with_model(model);
            }
            config.generation = Some(generation);
        }

        config
    }

    pub fn documents_db(&self) -> PathBuf {
        self.data_dir.join("documents.db")
    }

    pub fn accounts_db(&self) -> PathBuf {
        self.data_dir.join("accounts.db")
    }
}
