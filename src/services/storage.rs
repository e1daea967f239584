use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::StorageConfig;

/// Characters escaped when a key is placed in a url path. `/` is kept so folders stay readable.
const KEY_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'+');

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Object store error: {0}")]
    Service(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds public object urls from the bucket location
#[derive(Debug, Clone)]
pub struct ObjectUrls {
    base: String,
}

impl ObjectUrls {
    /// `https://{bucket}.s3.{region}.amazonaws.com`
    pub fn virtual_hosted(bucket: &str, region: &str) -> Self {
        Self {
            base: format!("https://{}.s3.{}.amazonaws.com", bucket, region),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        if let Some(base) = &config.public_base_url {
            return Self {
                base: base.trim_end_matches('/').to_string(),
            };
        }
        match &config.endpoint {
            // Custom endpoints are addressed path-style
            Some(endpoint) => Self {
                base: format!("{}/{}", endpoint.trim_end_matches('/'), config.bucket),
            },
            None => Self::virtual_hosted(&config.bucket, &config.region),
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base, utf8_percent_encode(key, KEY_PATH))
    }
}

/// Put/delete over a remote object store. One instance is built at startup and shared.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Deleting a key that does not exist is not an error.
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;

    /// Publicly resolvable address of `key`
    fn object_url(&self, key: &str) -> String;

    fn bucket(&self) -> &str;
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    urls: ObjectUrls,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String, urls: ObjectUrls) -> Self {
        Self {
            client,
            bucket,
            urls,
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&self.bucket, e))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&self.bucket, e))?;
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        self.urls.url_for(key)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn classify_sdk_error<E, R>(bucket: &str, err: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => StorageError::Transport(detail),
        _ => match err.as_service_error().and_then(|e| e.code()) {
            Some("NoSuchBucket") => StorageError::BucketNotFound(bucket.to_string()),
            Some(
                "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken",
            ) => StorageError::Unauthorized(detail),
            _ => StorageError::Service(detail),
        },
    }
}

#[derive(Debug, Clone)]
pub struct MemoryObject {
    pub body: Bytes,
    pub content_type: String,
}

/// Object store kept in process memory. Used for local development and tests.
pub struct MemoryObjectStore {
    bucket: String,
    urls: ObjectUrls,
    objects: RwLock<HashMap<String, MemoryObject>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let urls = ObjectUrls::virtual_hosted(&bucket, "us-east-1");
        Self::with_urls(bucket, urls)
    }

    pub fn with_urls(bucket: impl Into<String>, urls: ObjectUrls) -> Self {
        Self {
            bucket: bucket.into(),
            urls,
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<MemoryObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.objects.write().await.insert(
            key.to_string(),
            MemoryObject {
                body: Bytes::from(body),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        self.urls.url_for(key)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
