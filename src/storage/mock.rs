use super::{prefixed_key, StorageService, IMAGE_PREFIX};
use crate::models::Image;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    buckets: HashMap<String, BTreeMap<String, Vec<u8>>>,
    public_buckets: HashSet<String>,
    initialize_count: usize,
    upload_count: usize,
    list_count: usize,
    policy_writes: usize,
}

/// In-memory stand-in for the object store, for tests and dry runs.
#[derive(Clone)]
pub struct MockStorageClient {
    state: Arc<Mutex<MockState>>,
    base_url: String,
    upload_bucket: String,
    download_bucket: String,
    should_fail: Arc<Mutex<bool>>,
}

impl MockStorageClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            base_url: "https://mock-storage.example.com".to_string(),
            upload_bucket: "images".to_string(),
            download_bucket: "images-watermarked".to_string(),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Seed an object directly into the download bucket, as if the
    /// watermark pipeline had already produced it.
    pub fn with_download_object(self, key: String, content: Vec<u8>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state
                .buckets
                .entry(self.download_bucket.clone())
                .or_default()
                .insert(key, content);
        }
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_initialize_count(&self) -> usize {
        self.state.lock().unwrap().initialize_count
    }

    pub fn get_upload_count(&self) -> usize {
        self.state.lock().unwrap().upload_count
    }

    pub fn get_list_count(&self) -> usize {
        self.state.lock().unwrap().list_count
    }

    /// Number of public-read policy writes performed, as opposed to policy
    /// reads that found the bucket already public.
    pub fn get_policy_write_count(&self) -> usize {
        self.state.lock().unwrap().policy_writes
    }

    pub fn is_public(&self, bucket: &str) -> bool {
        self.state.lock().unwrap().public_buckets.contains(bucket)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
    }

    /// Resolve a URL produced by this mock back to the stored bytes,
    /// honoring the public-read policy of the owning bucket.
    pub fn object_by_url(&self, url: &str) -> Option<Vec<u8>> {
        let path = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        let (bucket, key) = path.split_once('/')?;
        if !self.is_public(bucket) {
            return None;
        }
        self.object(bucket, key)
    }

    /// Copy an uploaded object into the download bucket, standing in for
    /// the out-of-band watermark step.
    pub fn promote_to_download(&self, key: &str) {
        let mut state = self.state.lock().unwrap();
        let content = state
            .buckets
            .get(&self.upload_bucket)
            .and_then(|objects| objects.get(key))
            .cloned();
        if let Some(content) = content {
            state
                .buckets
                .entry(self.download_bucket.clone())
                .or_default()
                .insert(key.to_string(), content);
        }
    }

    fn fail_if_requested(&self, operation: &str) -> Result<()> {
        if *self.should_fail.lock().unwrap() {
            return Err(Error::Backend(format!("Mock failure in {}", operation)));
        }
        Ok(())
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket, key)
    }
}

impl Default for MockStorageClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageService for MockStorageClient {
    async fn initialize(&self) -> Result<()> {
        self.fail_if_requested("initialize")?;

        let mut state = self.state.lock().unwrap();
        state.initialize_count += 1;
        state
            .buckets
            .entry(self.download_bucket.clone())
            .or_default();
        if state.public_buckets.insert(self.download_bucket.clone()) {
            state.policy_writes += 1;
        }
        Ok(())
    }

    async fn add_image(&self, data: &[u8], file_name: &str) -> Result<Image> {
        self.fail_if_requested("add_image")?;
        let key = prefixed_key(file_name)?;

        let mut state = self.state.lock().unwrap();
        state.upload_count += 1;
        state
            .buckets
            .entry(self.upload_bucket.clone())
            .or_default()
            .insert(key.clone(), data.to_vec());

        Ok(Image {
            file_name: Some(key.clone()),
            image_path: self.object_url(&self.upload_bucket, &key),
        })
    }

    async fn get_images(&self) -> Result<Vec<Image>> {
        self.initialize().await?;

        let mut state = self.state.lock().unwrap();
        state.list_count += 1;
        let images = state
            .buckets
            .get(&self.download_bucket)
            .map(|objects| {
                objects
                    .keys()
                    .filter(|key| key.starts_with(IMAGE_PREFIX))
                    .map(|key| Image {
                        file_name: None,
                        image_path: self.object_url(&self.download_bucket, key),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_upload_stores_bytes_under_prefixed_key() {
        let storage = MockStorageClient::new();

        let image = storage.add_image(b"hello", "cat.png").await.unwrap();

        assert_eq!(image.file_name.as_deref(), Some("img_cat.png"));
        assert_eq!(
            image.image_path,
            "https://mock-storage.example.com/images/img_cat.png"
        );
        assert_eq!(storage.object("images", "img_cat.png").unwrap(), b"hello");
        assert_eq!(storage.get_upload_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_list_filters_by_prefix() {
        let storage = MockStorageClient::new()
            .with_download_object("img_a.png".to_string(), b"a".to_vec())
            .with_download_object("thumb_b.png".to_string(), b"b".to_vec());

        let images = storage.get_images().await.unwrap();

        assert_eq!(images.len(), 1);
        assert!(images[0].image_path.ends_with("/img_a.png"));
    }

    #[tokio::test]
    async fn test_mock_with_custom_base_url() {
        let storage =
            MockStorageClient::new().with_base_url("https://custom-storage.com".to_string());

        let image = storage.add_image(b"data", "dog.png").await.unwrap();

        assert_eq!(
            image.image_path,
            "https://custom-storage.com/images/img_dog.png"
        );
    }

    #[tokio::test]
    async fn test_mock_with_failure() {
        let storage = MockStorageClient::new().with_failure(true);

        assert!(storage.initialize().await.is_err());
        assert!(storage.add_image(b"data", "cat.png").await.is_err());
        assert!(storage.get_images().await.is_err());
        assert_eq!(storage.get_upload_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_url_resolution_requires_public_bucket() {
        let storage = MockStorageClient::new();

        let image = storage.add_image(b"raw", "cat.png").await.unwrap();
        // The upload bucket is never made public.
        assert_eq!(storage.object_by_url(&image.image_path), None);

        storage.promote_to_download("img_cat.png");
        storage.initialize().await.unwrap();
        let images = storage.get_images().await.unwrap();
        assert_eq!(
            storage.object_by_url(&images[0].image_path).unwrap(),
            b"raw"
        );
    }
}
