//! Object storage integration for the gallery
//!
//! Uploads user images into the upload bucket and lists watermarked images
//! from the public download bucket for display.

pub mod client;
pub mod mock;

pub use client::StorageClient;
pub use mock::MockStorageClient;

use crate::models::Image;
use crate::{Error, Result};
use async_trait::async_trait;

/// Object key prefix applied to every uploaded image.
pub const IMAGE_PREFIX: &str = "img_";

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensure the download bucket exists and its objects are publicly
    /// readable. Idempotent and safe to retry.
    async fn initialize(&self) -> Result<()>;

    /// Store image bytes in the upload bucket under the fixed key prefix,
    /// overwriting any object with the same key.
    async fn add_image(&self, data: &[u8], file_name: &str) -> Result<Image>;

    /// List every prefixed image in the download bucket, fully drained.
    async fn get_images(&self) -> Result<Vec<Image>>;
}

/// Compute the object key for an uploaded image.
///
/// The file name is not sanitized beyond the emptiness check; callers own
/// file-name safety.
pub(crate) fn prefixed_key(file_name: &str) -> Result<String> {
    if file_name.is_empty() {
        return Err(Error::InvalidInput(
            "file name must not be empty".to_string(),
        ));
    }
    Ok(format!("{}{}", IMAGE_PREFIX, file_name))
}
