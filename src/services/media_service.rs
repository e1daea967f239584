use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::services::staging::StagedFile;
use crate::services::storage::{ObjectStore, StorageError};
use crate::utils::keys::{content_type_for, object_key};

/// Where an uploaded object lives. `key` is what callers persist for later deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StoredObjectRef {
    pub url: String,
    pub key: String,
}

#[derive(Debug)]
pub enum UploadOutcome {
    Stored(StoredObjectRef),
    /// The local file was not there; nothing was sent to the store.
    Missing,
    /// Read or put failed. Already logged; the staged file has been removed.
    Failed,
}

impl UploadOutcome {
    pub fn into_stored(self) -> Option<StoredObjectRef> {
        match self {
            UploadOutcome::Stored(stored) => Some(stored),
            _ => None,
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, UploadOutcome::Stored(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Empty key; the store was not contacted.
    NoKey,
    Failed,
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}

/// Moves staged media into the object store and removes it again by key.
///
/// Failures never cross this boundary as errors: every call resolves to an outcome
/// the caller has to inspect.
pub struct MediaService {
    store: Arc<dyn ObjectStore>,
}

impl MediaService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Uploads the file at `local_path` under `folder`, taking ownership of it.
    /// The file is gone afterwards whatever the outcome.
    pub async fn upload_path(&self, local_path: impl AsRef<Path>, folder: &str) -> UploadOutcome {
        let local_path = local_path.as_ref();
        match StagedFile::adopt(local_path).await {
            Some(staged) => self.upload(staged, folder).await,
            None => {
                tracing::warn!("upload: no file at {}", local_path.display());
                UploadOutcome::Missing
            }
        }
    }

    pub async fn upload(&self, staged: StagedFile, folder: &str) -> UploadOutcome {
        let key = object_key(folder, Utc::now().timestamp_millis(), staged.original_name());
        let content_type = content_type_for(staged.original_name());

        let result = self.put_staged(&staged, &key, content_type).await;
        staged.discard().await;

        match result {
            Ok(()) => {
                let url = self.store.object_url(&key);
                tracing::info!("Upload successful: {}", url);
                UploadOutcome::Stored(StoredObjectRef { url, key })
            }
            Err(e) => {
                tracing::error!("Upload of {} failed: {}", key, e);
                UploadOutcome::Failed
            }
        }
    }

    /// Uploads several staged files concurrently, preserving input order.
    pub async fn upload_all(&self, staged: Vec<StagedFile>, folder: &str) -> Vec<UploadOutcome> {
        join_all(staged.into_iter().map(|file| self.upload(file, folder))).await
    }

    async fn put_staged(
        &self,
        staged: &StagedFile,
        key: &str,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let body = tokio::fs::read(staged.path()).await?;
        self.store.put_object(key, body, content_type).await
    }

    pub async fn delete(&self, key: &str) -> DeleteOutcome {
        if key.is_empty() {
            tracing::warn!("delete: no key provided");
            return DeleteOutcome::NoKey;
        }

        match self.store.delete_object(key).await {
            Ok(()) => {
                tracing::info!("Deletion successful for key: {}", key);
                DeleteOutcome::Deleted
            }
            Err(e) => {
                tracing::error!("Deletion of {} failed: {}", key, e);
                DeleteOutcome::Failed
            }
        }
    }
}
