use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_sdk_s3::{Client, primitives::ByteStream};
use aws_types::region::Region;
use tracing::info;

use crate::{
    config::Config,
    storage::{BlobStore, StorageError, StoredBlob},
};

// AWS S3 (or any S3-compatible service) blob storage
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Initialize S3 client and ensure the bucket exists
    pub async fn new(config: &Config) -> Self {
        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()))
            .or_default_provider()
            .or_else(Region::new("us-east-1"));

        let mut aws_config_builder = aws_config::from_env().region(region_provider);

        // Custom endpoint (e.g., MinIO or R2)
        if let Some(endpoint) = &config.s3_endpoint {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);

            let credentials = Credentials::new(
                config.s3_access_key.clone(),
                config.s3_secret_key.clone(),
                None,
                None,
                "custom",
            );

            aws_config_builder = aws_config_builder.credentials_provider(credentials);
        }

        let aws_config = aws_config_builder.load().await;

        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true)
                .build(),
        );

        Self::ensure_bucket_exists(&client, &config.s3_bucket).await;

        Self {
            client,
            bucket: config.s3_bucket.clone(),
        }
    }

    /// Ensure the bucket exists, or create it if possible
    async fn ensure_bucket_exists(client: &Client, bucket: &str) {
        match client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!("Bucket {} exists", bucket);
                return;
            }
            Err(e) => tracing::debug!("head_bucket {} failed: {}", bucket, e),
        }

        match client.create_bucket().bucket(bucket).send().await {
            Ok(_) => info!("Bucket {} created successfully", bucket),
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("BucketAlreadyOwnedByYou")
                    || err_msg.contains("BucketAlreadyExists")
                {
                    info!("Bucket {} already exists", bucket);
                } else {
                    tracing::error!(
                        "Bucket {} does not exist and cannot be created: {}",
                        bucket,
                        err_msg
                    );
                }
            }
        }
    }
}

#[async_trait]
impl BlobStore for S3Storage {
    async fn put(&self, key: &str, content: bytes::Bytes, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| StorageError::UploadError(e.to_string()))?;

        info!("Stored s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredBlob, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::DownloadError(e.to_string())
                }
            })?;

        let content_type = response
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadError(e.to_string()))?;

        Ok(StoredBlob {
            content: data.into_bytes(),
            content_type,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::DeleteError(e.to_string()))?;

        info!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}
