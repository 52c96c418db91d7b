//! HTTP surface: enqueue endpoint, gallery reads, health, and the
//! live-update WebSocket.
//!
//! Handlers are thin: validation happens in the model, queueing in
//! [`ArtQueue`], reads in the db layer. The service object in
//! [`AppState`] is constructed once at startup and injected here and
//! into the worker pool — no module-level singletons.

pub mod ws;

use std::sync::Arc;

use axum::Router;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::broadcast::{Broadcaster, publish_queue_update};
use crate::db::Db;
use crate::error::Error;
use crate::model::ArtRequest;
use crate::queue::ArtQueue;

/// Shared application state available to all handlers via `State`.
/// Cheaply cloneable; inner data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub queue: Arc<ArtQueue>,
    pub broadcaster: Arc<Broadcaster>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/art/generate", post(generate))
        .route("/api/art/gallery", get(gallery))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

async fn root() -> &'static str {
    "starforge: satellite signature artwork service"
}

async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.db.health_check().await?;
    Ok(axum::Json(json!({"status": "ok"})))
}

/// POST /api/art/generate — multipart `{image, prompt, negativePrompt,
/// satelliteName, imageName}`. Validates synchronously, enqueues, answers
/// 202 with the job id. Generation itself happens on the worker pool, so
/// request latency stays independent of backend latency.
async fn generate(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut image: Option<Vec<u8>> = None;
    let mut prompt = String::new();
    let mut negative_prompt = String::new();
    let mut satellite_name = String::new();
    let mut image_name = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::Validation(e.to_string()))?;
                image = Some(bytes.to_vec());
            }
            "prompt" => prompt = field_text(field).await?,
            "negativePrompt" => negative_prompt = field_text(field).await?,
            "satelliteName" => satellite_name = field_text(field).await?,
            "imageName" => image_name = field_text(field).await?,
            _ => {}
        }
    }

    let image = image.ok_or_else(|| Error::Validation("no image file provided".to_string()))?;
    let request = ArtRequest::new(prompt, negative_prompt, satellite_name, image_name, image)?;

    let job_id = state.queue.enqueue(&request).await?;

    // Notify all subscribers that the queue has changed.
    if let Err(e) = publish_queue_update(&state.queue, &state.broadcaster).await {
        error!("queue update publish failed: {e}");
    }

    Ok((
        StatusCode::ACCEPTED,
        axum::Json(json!({
            "message": "Request accepted and queued for processing.",
            "jobId": job_id,
        })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GalleryParams {
    page: Option<i64>,
    limit: Option<i64>,
    satellite_name: Option<String>,
}

/// GET /api/art/gallery — paginated artworks, newest first.
async fn gallery(
    State(state): State<AppState>,
    Query(params): Query<GalleryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .db
        .list_artworks(
            params.page.unwrap_or(1),
            params.limit.unwrap_or(9),
            params.satellite_name.as_deref(),
        )
        .await?;
    Ok(axum::Json(page))
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, Error> {
    field
        .text()
        .await
        .map_err(|e| Error::Validation(e.to_string()))
}

/// Wrapper so crate errors map onto HTTP responses.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::QueueUnavailable(_) => {
                error!("enqueue failed: {}", self.0);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "could not queue request".to_string(),
                )
            }
            other => {
                error!("internal error: {other}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "an internal error occurred".to_string(),
                )
            }
        };

        (status, axum::Json(json!({"error": message}))).into_response()
    }
}
