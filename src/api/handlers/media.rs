use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::staging::StagedUploads;
use crate::services::media_service::{DeleteOutcome, StoredObjectRef, UploadOutcome};

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadQuery {
    /// Key prefix such as `property/` or `user/`. May also be sent as a form field.
    #[validate(length(max = 200), custom(function = "validate_folder"))]
    pub folder: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteQuery {
    /// Key returned by a previous upload
    pub key: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    /// Set when exactly one file was uploaded
    pub url: Option<String>,
    pub key: Option<String>,
    pub files: Vec<StoredObjectRef>,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub key: String,
}

fn validate_folder(folder: &str) -> Result<(), validator::ValidationError> {
    let bad_segment = folder
        .split('/')
        .any(|segment| segment == "." || segment == "..");
    if bad_segment || folder.contains('\\') || folder.chars().any(char::is_control) {
        return Err(validator::ValidationError::new("invalid_folder"));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/upload",
    params(UploadQuery),
    request_body(content = String, description = "Multipart form with one or more `file` parts", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Files uploaded successfully", body = UploadResponse),
        (status = 400, description = "No file, invalid type or too many files"),
        (status = 413, description = "File too large"),
        (status = 500, description = "Object store upload failed")
    ),
    tag = "media"
)]
pub async fn upload_media(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    uploads: StagedUploads,
) -> Result<Json<UploadResponse>, AppError> {
    let params = UploadQuery {
        folder: query
            .folder
            .or_else(|| uploads.field("folder").map(str::to_string)),
    };
    params
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid folder: {}", e)))?;
    let folder = params
        .folder
        .unwrap_or_else(|| state.config.default_folder.clone());

    if uploads.files.is_empty() {
        return Err(AppError::BadRequest("No file uploaded".to_string()));
    }

    let outcomes = state.media.upload_all(uploads.files, &folder).await;
    let total = outcomes.len();
    let stored: Vec<StoredObjectRef> = outcomes
        .into_iter()
        .filter_map(UploadOutcome::into_stored)
        .collect();

    if stored.len() != total {
        // Leave no orphans behind when part of a batch failed
        for object in &stored {
            if state.media.delete(&object.key).await != DeleteOutcome::Deleted {
                tracing::warn!("Orphaned object left in store: {}", object.key);
            }
        }
        return Err(AppError::Internal("S3 upload failed".to_string()));
    }

    let (url, key) = match stored.as_slice() {
        [only] => (Some(only.url.clone()), Some(only.key.clone())),
        _ => (None, None),
    };

    Ok(Json(UploadResponse {
        message: "File uploaded successfully!".to_string(),
        url,
        key,
        files: stored,
    }))
}

#[utoipa::path(
    delete,
    path = "/media",
    params(DeleteQuery),
    responses(
        (status = 200, description = "Object deleted", body = DeleteResponse),
        (status = 400, description = "No key provided"),
        (status = 500, description = "Object store deletion failed")
    ),
    tag = "media"
)]
pub async fn delete_media(
    State(state): State<AppState>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteResponse>, AppError> {
    let key = query.key.unwrap_or_default();

    match state.media.delete(&key).await {
        DeleteOutcome::Deleted => Ok(Json(DeleteResponse { deleted: true, key })),
        DeleteOutcome::NoKey => Err(AppError::BadRequest("No key provided".to_string())),
        DeleteOutcome::Failed => Err(AppError::Internal("S3 deletion failed".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_folder() {
        assert!(validate_folder("property/").is_ok());
        assert!(validate_folder("user/avatars").is_ok());
        assert!(validate_folder("../secrets").is_err());
        assert!(validate_folder("a/./b").is_err());
        assert!(validate_folder("a\\b").is_err());
    }

    #[test]
    fn test_upload_query_validation() {
        let ok = UploadQuery {
            folder: Some("blog/".to_string()),
        };
        assert!(ok.validate().is_ok());

        let too_long = UploadQuery {
            folder: Some("x".repeat(201)),
        };
        assert!(too_long.validate().is_err());

        assert!(UploadQuery { folder: None }.validate().is_ok());
    }
}
