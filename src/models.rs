//! Data models and configuration
//!
//! Defines the Image display model handed to the presentation layer and the
//! environment-driven storage configuration.

use serde::{Deserialize, Serialize};

/// Display model for a stored image.
///
/// Upload responses carry both fields. Listing entries carry only
/// `image_path`; file-name metadata is not retained on the listing path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub image_path: String,
}

// Configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: String,
    pub region: String,
    pub upload_bucket: String,
    pub download_bucket: String,
}

impl StorageConfig {
    /// Read the configuration from the environment once; there is no hot
    /// reload.
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            access_key_id: std::env::var("STORAGE_ACCESS_KEY_ID")
                .map_err(|_| crate::Error::Config("STORAGE_ACCESS_KEY_ID not set".to_string()))?,
            secret_access_key: std::env::var("STORAGE_SECRET_ACCESS_KEY").map_err(|_| {
                crate::Error::Config("STORAGE_SECRET_ACCESS_KEY not set".to_string())
            })?,
            endpoint: std::env::var("STORAGE_ENDPOINT")
                .unwrap_or_else(|_| "https://s3.us-east-1.amazonaws.com".to_string()),
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            upload_bucket: std::env::var("UPLOAD_BUCKET").unwrap_or_else(|_| "images".to_string()),
            download_bucket: std::env::var("DOWNLOAD_BUCKET")
                .unwrap_or_else(|_| "images-watermarked".to_string()),
        })
    }
}
