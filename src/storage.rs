use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}")]
    Other(String),
}

/// Blob storage collaborator. Deletion targets a set of object paths within
/// one bucket per call; callers group paths by bucket first.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn remove_objects(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError>;
}

// ---------------- S3 Implementation (MinIO compatible) ----------------
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub async fn new() -> anyhow::Result<Self> {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;

        let endpoint = std::env::var("S3_ENDPOINT")
            .map_err(|_| anyhow::anyhow!("S3_ENDPOINT must be set (MinIO / S3 endpoint)"))?;
        let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into());
        let access = std::env::var("S3_ACCESS_KEY").unwrap_or_default();
        let secret = std::env::var("S3_SECRET_KEY").unwrap_or_default();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region));
        loader = loader.endpoint_url(endpoint);
        if !access.is_empty() && !secret.is_empty() {
            let creds = Credentials::new(access, secret, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
        }
        let conf = loader.load().await;
        // Path-style addressing (required for most MinIO/local endpoints
        // without wildcard DNS)
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf)
            .force_path_style(true)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_conf);
        info!("Initialized S3/MinIO client (path-style addressing enabled)");

        Ok(Self { client })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn remove_objects(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError> {
        use aws_sdk_s3::types::{Delete, ObjectIdentifier};

        if paths.is_empty() {
            return Ok(());
        }
        let objects: Vec<ObjectIdentifier> = paths
            .iter()
            .map(|p| ObjectIdentifier::builder().key(p).build())
            .collect::<Result<_, _>>()
            .map_err(|e| StorageError::Other(e.to_string()))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(|e| StorageError::Other(e.to_string()))?;
        let resp = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| {
                error!("delete_objects failed bucket={bucket} err={e:?}");
                StorageError::Other(e.to_string())
            })?;
        // DeleteObjects reports per-key failures in the response body rather
        // than the status code.
        let errs = resp.errors();
        if !errs.is_empty() {
            let first = errs[0].message().unwrap_or("unknown error");
            error!(
                "delete_objects partial failure bucket={bucket} failed={} first={first}",
                errs.len()
            );
            return Err(StorageError::Other(format!(
                "{} object(s) failed to delete: {first}",
                errs.len()
            )));
        }
        Ok(())
    }
}

/// Factory helper used at application wiring time.
pub async fn build_object_store() -> anyhow::Result<Arc<dyn ObjectStore>> {
    Ok(Arc::new(S3ObjectStore::new().await?))
}
