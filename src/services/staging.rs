use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::utils::validation::{ValidationError, validate_file_size};

/// A received file waiting for its remote upload.
///
/// The local copy is owned by this value: dropping it removes the file, so no exit
/// path of the upload can leave it behind.
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
    original_name: String,
    declared_mime_type: Option<String>,
    size_bytes: u64,
}

impl StagedFile {
    /// Takes ownership of an existing file on disk.
    /// Returns `None` when the path does not name a regular file.
    pub async fn adopt(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.ok()?;
        if !metadata.is_file() {
            return None;
        }

        let original_name = path.file_name()?.to_string_lossy().into_owned();

        Some(Self {
            path: TempPath::try_from_path(path).ok()?,
            original_name,
            declared_mime_type: None,
            size_bytes: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name used when building the object key
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn declared_mime_type(&self) -> Option<&str> {
        self.declared_mime_type.as_deref()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Removes the local copy now, logging instead of failing.
    pub async fn discard(self) {
        let shown = self.path.display().to_string();
        let result = tokio::task::spawn_blocking(move || self.path.close()).await;
        match result {
            Ok(Ok(())) => tracing::debug!("Removed staged file {}", shown),
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {}
            Ok(Err(e)) => tracing::warn!("Failed to remove staged file {}: {}", shown, e),
            Err(e) => tracing::warn!("Staging cleanup task failed for {}: {}", shown, e),
        }
    }
}

/// Directory where request bodies are spooled before upload
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Opens a new staging file for `original_name`. Nothing is written yet.
    pub async fn create(
        &self,
        original_name: &str,
        declared_mime_type: Option<&str>,
        max_size: usize,
    ) -> io::Result<StagingWriter> {
        let suffix = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();

        let dir = self.dir.clone();
        let named = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix("file-")
                .suffix(&suffix)
                .tempfile_in(dir)
        })
        .await
        .map_err(io::Error::other)??;

        let (file, path) = named.into_parts();

        Ok(StagingWriter {
            file: File::from_std(file),
            path,
            original_name: original_name.to_string(),
            declared_mime_type: declared_mime_type.map(str::to_string),
            written: 0,
            max_size,
        })
    }
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("{0}")]
    TooLarge(ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Incoming bytes for one staged file. Dropped writers remove their partial file.
pub struct StagingWriter {
    file: File,
    path: TempPath,
    original_name: String,
    declared_mime_type: Option<String>,
    written: usize,
    max_size: usize,
}

impl StagingWriter {
    /// Appends a chunk, refusing it if the file would grow past the size limit.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StagingError> {
        let next = self.written.saturating_add(chunk.len());
        validate_file_size(next, self.max_size).map_err(StagingError::TooLarge)?;

        self.file.write_all(chunk).await?;
        self.written = next;
        Ok(())
    }

    pub async fn finish(mut self) -> io::Result<StagedFile> {
        self.file.flush().await?;
        self.file.sync_all().await?;

        Ok(StagedFile {
            path: self.path,
            original_name: self.original_name,
            declared_mime_type: self.declared_mime_type,
            size_bytes: self.written as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_adopt_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(StagedFile::adopt(dir.path().join("nope.jpg")).await.is_none());
        // Directories are not staged files
        assert!(StagedFile::adopt(dir.path()).await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_staged_file_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        tokio::fs::write(&path, b"jpeg").await.unwrap();

        let staged = StagedFile::adopt(&path).await.unwrap();
        assert_eq!(staged.original_name(), "photo.jpg");
        assert_eq!(staged.size_bytes(), 4);
        drop(staged);

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_writer_roundtrip_and_discard() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path());

        let mut writer = area.create("Villa.JPG", Some("image/jpeg"), 16).await.unwrap();
        writer.write_chunk(b"0123456789").await.unwrap();
        let staged = writer.finish().await.unwrap();

        let path = staged.path().to_path_buf();
        assert!(path.starts_with(dir.path()));
        assert_eq!(path.extension().unwrap(), "jpg");
        assert_eq!(staged.size_bytes(), 10);
        assert_eq!(staged.declared_mime_type(), Some("image/jpeg"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"0123456789");

        staged.discard().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_discard_tolerates_removed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.png");
        tokio::fs::write(&path, b"png").await.unwrap();

        let staged = StagedFile::adopt(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        // Already removed: nothing to do, nothing to report
        staged.discard().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_writer_rejects_oversized_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path());

        let mut writer = area.create("big.png", Some("image/png"), 8).await.unwrap();
        writer.write_chunk(b"12345").await.unwrap();
        let err = writer.write_chunk(b"67890").await.unwrap_err();
        assert!(matches!(err, StagingError::TooLarge(_)));
        assert!(err.to_string().starts_with("FILE_TOO_LARGE"));
        drop(writer);

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }
}
