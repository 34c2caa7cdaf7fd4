//! Remote services used by the Campus Market client
//!
//! - **upload**: unsigned image upload to Cloudinary, one round trip per file
//! - **copywriter**: listing descriptions from a generative text model, with
//!   deterministic templates whenever the model is absent or fails

pub mod copywriter;
pub mod error;
pub mod upload;

pub use copywriter::{GeminiGenerator, GenerationConfig, ListingBrief, ListingCopywriter, TextGenerator};
pub use error::{GenerationError, UploadError};
pub use upload::{CloudinaryUploader, ImageFile, ImageUploader, UploadConfig};
