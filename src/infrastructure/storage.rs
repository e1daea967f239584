use crate::config::{StorageBackend, StorageConfig};
use crate::services::storage::{MemoryObjectStore, ObjectStore, ObjectUrls, S3ObjectStore};
use anyhow::{Result, anyhow};
use aws_sdk_s3::config::{Credentials, Region};
use std::sync::Arc;
use tracing::info;

/// Builds the single object store client shared by every request.
pub async fn setup_storage(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    let urls = ObjectUrls::from_config(config);

    if config.backend == StorageBackend::Memory {
        info!("🧪 In-memory object store (Bucket: {})", config.bucket);
        return Ok(Arc::new(MemoryObjectStore::with_urls(
            config.bucket.clone(),
            urls,
        )));
    }

    info!(
        "☁️  S3 Storage: {} (Bucket: {})",
        config.endpoint.as_deref().unwrap_or(&config.region),
        config.bucket
    );

    let mut loader = aws_config::from_env().region(Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    match (&config.access_key_id, &config.secret_access_key) {
        (Some(access_key), Some(secret_key)) => {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "static",
            ));
        }
        (None, None) => info!("🔑 Using default AWS credential chain"),
        _ => {
            return Err(anyhow!(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together"
            ));
        }
    }

    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.endpoint.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    Ok(Arc::new(S3ObjectStore::new(
        s3_client,
        config.bucket.clone(),
        urls,
    )))
}
