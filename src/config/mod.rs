use anyhow::{Result, anyhow};
use std::env;
use std::path::PathBuf;

/// Limits applied to incoming media before anything touches the staging area
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum file size in bytes (default: 10 MB)
    pub max_file_size: usize,

    /// Maximum number of files in one request (default: 15)
    pub max_files: usize,

    /// Directory holding files between receipt and remote upload (default: "./uploads")
    pub staging_dir: PathBuf,

    /// Folder prefix used when the request names none (default: "test-folder/")
    pub default_folder: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10 MB
            max_files: 15,
            staging_dir: PathBuf::from("./uploads"),
            default_folder: "test-folder/".to_string(),
        }
    }
}

impl UploadConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            max_files: env::var("MAX_FILES_PER_REQUEST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_files),

            staging_dir: env::var("UPLOAD_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            default_folder: env::var("UPLOAD_DEFAULT_FOLDER").unwrap_or(default.default_folder),
        }
    }

    /// Upper bound for a whole multipart request body
    pub fn body_limit(&self) -> usize {
        // 1MB on top for multipart boundaries and text fields
        self.max_file_size
            .saturating_mul(self.max_files)
            .saturating_add(1024 * 1024)
    }
}

/// Which object store implementation backs the media service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::S3 => "s3",
            StorageBackend::Memory => "memory",
        }
    }
}

/// Remote object store settings, resolved once at startup
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// "s3" or "memory" (default: "s3")
    pub backend: StorageBackend,

    pub bucket: String,

    pub region: String,

    /// Custom S3-compatible endpoint (MinIO, LocalStack). Switches to path-style addressing.
    pub endpoint: Option<String>,

    /// Static credentials. When absent the default AWS provider chain is used.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,

    /// Overrides the base of public object urls (CDN in front of the bucket)
    pub public_base_url: Option<String>,
}

impl StorageConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .to_lowercase()
            .as_str()
        {
            "s3" => StorageBackend::S3,
            "memory" => StorageBackend::Memory,
            other => return Err(anyhow!("Unknown STORAGE_BACKEND '{}'", other)),
        };

        let bucket = non_empty_var("AWS_BUCKET_NAME");
        let region = non_empty_var("AWS_REGION");

        let (bucket, region) = match backend {
            StorageBackend::S3 => (
                bucket.ok_or_else(|| anyhow!("AWS_BUCKET_NAME must be set"))?,
                region.ok_or_else(|| anyhow!("AWS_REGION must be set"))?,
            ),
            StorageBackend::Memory => (
                bucket.unwrap_or_else(|| "local-media".to_string()),
                region.unwrap_or_else(|| "us-east-1".to_string()),
            ),
        };

        Ok(Self {
            backend,
            bucket,
            region,
            endpoint: non_empty_var("AWS_ENDPOINT_URL"),
            access_key_id: non_empty_var("AWS_ACCESS_KEY_ID"),
            secret_access_key: non_empty_var("AWS_SECRET_ACCESS_KEY"),
            public_base_url: non_empty_var("MEDIA_PUBLIC_BASE_URL"),
        })
    }

    /// Create config for development (in-memory store, no AWS account needed)
    pub fn development() -> Self {
        Self {
            backend: StorageBackend::Memory,
            bucket: "local-media".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            public_base_url: None,
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            host: env::var("HOST").unwrap_or(default.host),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
