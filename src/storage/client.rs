use super::{prefixed_key, StorageService, IMAGE_PREFIX};
use crate::models::{Image, StorageConfig};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketCannedAcl, Grant, Permission};
use aws_sdk_s3::{config::Region, Client as S3Client};
use tracing::{debug, info};

/// Page size requested from the backend while listing.
const LIST_PAGE_SIZE: i32 = 100;

/// Grantee URI identifying unauthenticated readers.
const ALL_USERS_GROUP_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

pub struct StorageClient {
    client: S3Client,
    endpoint: String,
    upload_bucket: String,
    download_bucket: String,
}

impl StorageClient {
    pub async fn new(config: StorageConfig) -> Result<Self> {
        let credentials = aws_sdk_s3::config::Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "imagegallery-storage",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(config.region))
            .endpoint_url(config.endpoint.clone())
            .load()
            .await;

        // Path-style addressing keeps object URLs in the
        // `{endpoint}/{bucket}/{key}` shape we hand to the gallery.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();
        let client = S3Client::from_conf(s3_config);

        Ok(Self {
            client,
            endpoint: config.endpoint,
            upload_bucket: config.upload_bucket,
            download_bucket: config.download_bucket,
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        object_url(&self.endpoint, bucket, key)
    }

    /// Create the bucket if it does not exist yet. Repeated and concurrent
    /// creates both resolve to an already-exists answer from the backend,
    /// which counts as success.
    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        let result = self.client.create_bucket().bucket(bucket).send().await;

        match result {
            Ok(_) => {
                info!("Created bucket {}", bucket);
                Ok(())
            }
            Err(err) => match err.as_service_error() {
                Some(e) if e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists() => {
                    Ok(())
                }
                _ => Err(Error::Backend(format!(
                    "Failed to create bucket {}: {}",
                    bucket, err
                ))),
            },
        }
    }

    /// Grant public read on the bucket's objects unless it is already in
    /// place, so the gallery can link to the pictures directly.
    async fn ensure_public_read(&self, bucket: &str) -> Result<()> {
        let acl = self
            .client
            .get_bucket_acl()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| Error::Backend(format!("Failed to read ACL for {}: {}", bucket, e)))?;

        if grants_public_read(acl.grants()) {
            return Ok(());
        }

        self.client
            .put_bucket_acl()
            .bucket(bucket)
            .acl(BucketCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| {
                Error::Backend(format!("Failed to set public-read on {}: {}", bucket, e))
            })?;

        info!("Set public-read policy on bucket {}", bucket);
        Ok(())
    }
}

fn object_url(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key)
}

fn grants_public_read(grants: &[Grant]) -> bool {
    grants.iter().any(|grant| {
        grant
            .permission()
            .is_some_and(|p| matches!(p, Permission::Read | Permission::FullControl))
            && grant
                .grantee()
                .and_then(|grantee| grantee.uri())
                .is_some_and(|uri| uri == ALL_USERS_GROUP_URI)
    })
}

#[async_trait]
impl StorageService for StorageClient {
    async fn initialize(&self) -> Result<()> {
        self.ensure_bucket(&self.download_bucket).await?;
        self.ensure_public_read(&self.download_bucket).await
    }

    async fn add_image(&self, data: &[u8], file_name: &str) -> Result<Image> {
        let key = prefixed_key(file_name)?;

        self.ensure_bucket(&self.upload_bucket).await?;

        let body = ByteStream::from(data.to_vec());
        self.client
            .put_object()
            .bucket(&self.upload_bucket)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Backend(format!("Failed to upload {}: {}", key, e)))?;

        debug!(
            "Stored {} ({} bytes) in bucket {}",
            key,
            data.len(),
            self.upload_bucket
        );

        Ok(Image {
            file_name: Some(key.clone()),
            image_path: self.object_url(&self.upload_bucket, &key),
        })
    }

    async fn get_images(&self) -> Result<Vec<Image>> {
        // Listing is only meaningful once the bucket exists and its objects
        // are publicly readable.
        self.initialize().await?;

        let mut images = Vec::new();
        let mut continuation: Option<String> = None;

        // Follow continuation tokens until the listing is exhausted; a
        // partial listing must never escape this loop.
        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.download_bucket)
                .prefix(IMAGE_PREFIX)
                .max_keys(LIST_PAGE_SIZE);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }

            let page = request.send().await.map_err(|e| {
                Error::Backend(format!("Failed to list {}: {}", self.download_bucket, e))
            })?;

            for object in page.contents() {
                if let Some(key) = object.key() {
                    images.push(Image {
                        file_name: None,
                        image_path: self.object_url(&self.download_bucket, key),
                    });
                }
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated() == Some(true) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!(
            "Listed {} images from bucket {}",
            images.len(),
            self.download_bucket
        );
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::types::{Grantee, Type};

    #[test]
    fn test_object_url_joins_path_style() {
        assert_eq!(
            object_url("https://storage.example.com", "images", "img_cat.png"),
            "https://storage.example.com/images/img_cat.png"
        );
    }

    #[test]
    fn test_object_url_trims_trailing_slash() {
        assert_eq!(
            object_url("https://storage.example.com/", "images", "img_cat.png"),
            "https://storage.example.com/images/img_cat.png"
        );
    }

    fn group_grant(uri: &str, permission: Permission) -> Grant {
        Grant::builder()
            .grantee(
                Grantee::builder()
                    .r#type(Type::Group)
                    .uri(uri)
                    .build()
                    .unwrap(),
            )
            .permission(permission)
            .build()
    }

    #[test]
    fn test_grants_public_read_detects_all_users_read() {
        let grants = vec![group_grant(ALL_USERS_GROUP_URI, Permission::Read)];
        assert!(grants_public_read(&grants));
    }

    #[test]
    fn test_grants_public_read_ignores_other_groups() {
        let grants = vec![group_grant(
            "http://acs.amazonaws.com/groups/global/AuthenticatedUsers",
            Permission::Read,
        )];
        assert!(!grants_public_read(&grants));
    }

    #[test]
    fn test_grants_public_read_ignores_write_only_grants() {
        let grants = vec![group_grant(ALL_USERS_GROUP_URI, Permission::Write)];
        assert!(!grants_public_read(&grants));
    }

    #[test]
    fn test_grants_public_read_empty() {
        assert!(!grants_public_read(&[]));
    }
}
