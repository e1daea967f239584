use axum::{
    extract::{FromRef, FromRequest, Multipart, Request},
    http::header::CONTENT_LENGTH,
};
use std::collections::{HashMap, HashSet};

use crate::api::error::AppError;
use crate::config::UploadConfig;
use crate::services::staging::{StagedFile, StagingArea, StagingError};
use crate::utils::keys::unique_file_name;
use crate::utils::validation::{sanitize_filename, validate_incoming_file};

/// Multipart body whose file parts have been validated and spooled to the staging area.
///
/// Every file part is checked (count, declared type, declared size) before its first
/// byte is written. The size limit is enforced again while streaming, because clients
/// rarely declare a per-part length. Rejection drops everything staged so far.
#[derive(Debug)]
pub struct StagedUploads {
    pub files: Vec<StagedFile>,
    pub fields: HashMap<String, String>,
}

impl StagedUploads {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[axum::async_trait]
impl<S> FromRequest<S> for StagedUploads
where
    S: Send + Sync,
    UploadConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let config = UploadConfig::from_ref(state);
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let staging = StagingArea::new(&config.staging_dir);
        let mut staging_ready = false;
        let mut files = Vec::new();
        let mut fields = HashMap::new();
        let mut names = HashSet::new();

        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            let Some(original_name) = field.file_name().map(str::to_string) else {
                let value = field.text().await?;
                fields.insert(name, value);
                continue;
            };

            let content_type = field.content_type().map(str::to_string);
            let declared_size = field
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok());

            validate_incoming_file(
                content_type.as_deref(),
                declared_size,
                files.len() + 1,
                config.max_file_size,
                config.max_files,
            )
            .inspect_err(|e| tracing::warn!("Rejected upload '{}': {}", original_name, e))?;

            // Phones often name every photo `image.jpg`
            let file_name = unique_file_name(&sanitize_filename(&original_name)?, &names);
            names.insert(file_name.clone());

            if !staging_ready {
                staging.ensure_dir().await?;
                staging_ready = true;
            }

            let mut writer = staging
                .create(&file_name, content_type.as_deref(), config.max_file_size)
                .await?;

            while let Some(chunk) = field.chunk().await? {
                writer.write_chunk(&chunk).await.map_err(|e| match e {
                    StagingError::TooLarge(v) => {
                        tracing::warn!("Rejected upload '{}': {}", file_name, v);
                        AppError::from(v)
                    }
                    StagingError::Io(io) => AppError::from(io),
                })?;
            }

            let staged = writer.finish().await?;
            tracing::debug!(
                "Staged '{}' ({} bytes) at {}",
                staged.original_name(),
                staged.size_bytes(),
                staged.path().display()
            );
            files.push(staged);
        }

        Ok(Self { files, fields })
    }
}
