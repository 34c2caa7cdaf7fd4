//! Listing descriptions from a generative text model
//!
//! [`ListingCopywriter::describe`] always produces text. When no model is
//! configured it fills a template, and when the model call fails it fills a
//! shorter one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::GenerationError;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const EMPTY_GENERATION: &str = "Could not generate description.";

/// Generative text service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
}

impl GenerationConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Prompt in, text out
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Gemini `generateContent` client
pub struct GeminiGenerator {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerationError::NotConfigured);
        }

        let endpoint = Url::parse(&config.api_base)
            .and_then(|base| {
                base.join(&format!("v1beta/models/{}:generateContent", config.model))
            })
            .map_err(|_| GenerationError::NotConfigured)?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: config.api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await?;

        if !status.is_success() {
            let message = payload
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(extract_text(&payload))
    }
}

/// Concatenated text parts of the first candidate, empty if there are none
pub(crate) fn extract_text(payload: &Value) -> String {
    payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// What the seller has told us about the item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingBrief {
    pub title: String,
    pub category: String,
    pub condition: String,
    pub notes: String,
}

impl ListingBrief {
    pub fn prompt(&self) -> String {
        format!(
            "Write a catchy, short, and honest sales description for a student marketplace app.\n\
             Item: {}\n\
             Category: {}\n\
             Condition: {}\n\
             Key Features/Notes: {}\n\n\
             Keep it under 100 words. Use a friendly, student-to-student tone. \
             Do not use hashtags. Mention it's available for pickup on campus.",
            self.title, self.category, self.condition, self.notes
        )
    }

    fn template(&self) -> String {
        let closing_note = if self.notes.trim().is_empty() {
            format!(
                "It is a great deal for students looking for {}.",
                self.category
            )
        } else {
            format!("Note: {}", self.notes)
        };

        format!(
            "Selling my {} ({}).\n\nCondition: {}\n\n{}\n\nMessage me for more details or to negotiate!",
            self.title, self.category, self.condition, closing_note
        )
    }

    fn fallback(&self) -> String {
        format!(
            "Selling my {}. It is in {} condition.\n\n{}\n\nGreat choice for students! Message me if interested.",
            self.title, self.condition, self.notes
        )
    }
}

/// Writes listing descriptions, with or without a model
#[derive(Clone, Default)]
pub struct ListingCopywriter {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl ListingCopywriter {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    /// Use Gemini when configured. A config the client rejects is logged
    /// and treated as absent.
    pub fn from_config(config: Option<GenerationConfig>) -> Self {
        let generator = config.and_then(|config| match GeminiGenerator::new(config) {
            Ok(generator) => Some(Arc::new(generator) as Arc<dyn TextGenerator>),
            Err(e) => {
                warn!("Generation disabled: {}", e);
                None
            }
        });
        Self { generator }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn describe(&self, brief: &ListingBrief) -> String {
        let Some(generator) = &self.generator else {
            debug!("No text generator configured, using template");
            return brief.template();
        };

        match generator.generate(&brief.prompt()).await {
            Ok(text) if text.trim().is_empty() => EMPTY_GENERATION.to_string(),
            Ok(text) => text,
            Err(e) => {
                warn!("Generation unavailable, using fallback template: {}", e);
                brief.fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief(notes: &str) -> ListingBrief {
        ListingBrief {
            title: "Desk Lamp".into(),
            category: "Furniture".into(),
            condition: "Used".into(),
            notes: notes.into(),
        }
    }

    #[test]
    fn test_template_without_notes() {
        assert_eq!(
            brief("").template(),
            "Selling my Desk Lamp (Furniture).\n\nCondition: Used\n\n\
             It is a great deal for students looking for Furniture.\n\n\
             Message me for more details or to negotiate!"
        );
    }

    #[test]
    fn test_template_with_notes() {
        assert!(brief("Warm light").template().contains("Note: Warm light"));
    }

    #[test]
    fn test_prompt_carries_brief() {
        let prompt = brief("Warm light").prompt();
        assert!(prompt.contains("Item: Desk Lamp"));
        assert!(prompt.contains("Key Features/Notes: Warm light"));
        assert!(prompt.contains("under 100 words"));
        assert!(prompt.contains("Do not use hashtags"));
    }

    #[test]
    fn test_extract_text() {
        let payload = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello " }, { "text": "there" }] } }]
        });
        assert_eq!(extract_text(&payload), "Hello there");
        assert_eq!(extract_text(&json!({ "candidates": [] })), "");
    }

    #[test]
    fn test_gemini_requires_key() {
        assert!(matches!(
            GeminiGenerator::new(GenerationConfig::new(" ")),
            Err(GenerationError::NotConfigured)
        ));

        let generator =
            GeminiGenerator::new(GenerationConfig::new("k").with_model("gemini-pro")).unwrap();
        assert_eq!(
            generator.endpoint().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
        );
    }
}
