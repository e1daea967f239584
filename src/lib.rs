pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::api::middleware::request_id::{make_request_span, request_id_middleware};
use crate::config::{StorageConfig, UploadConfig};
use crate::services::media_service::MediaService;
use axum::{
    Router,
    extract::FromRef,
    middleware::from_fn,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::media::upload_media,
        api::handlers::media::delete_media,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::media::UploadResponse,
            api::handlers::media::DeleteResponse,
            services::media_service::StoredObjectRef,
        )
    ),
    tags(
        (name = "media", description = "Listing media upload and deletion"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub media: Arc<MediaService>,
    pub config: UploadConfig,
    pub storage: StorageConfig,
}

impl FromRef<AppState> for UploadConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(api::handlers::health::root))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/upload",
            post(api::handlers::media::upload_media).layer(
                axum::extract::DefaultBodyLimit::max(state.config.body_limit()),
            ),
        )
        .route("/media", delete(api::handlers::media::delete_media))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_request_span::<axum::body::Body>)
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        // Outermost, so the trace span already sees the id
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
