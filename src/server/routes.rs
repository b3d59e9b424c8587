//! # API Routes
//!
//! - `POST /api/image/process`: JSON `{ "imageBase64": <data URL> }`
//! - `POST /api/image/upload`: multipart form with a `file` field
//! - `GET /api/health`
//!
//! Both image routes answer `{ "processedImage": <data URL> }` on success and
//! `{ "error": <message>, "kind": <classification> }` otherwise.

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::common::data_url::ImagePayload;
use crate::relay::client::UPLOAD_FIELD;
use crate::relay::{ErrorKind, RelayError};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub image_base64: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub processed_image: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    /// Upstream status, for `upstream_failure` only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&RelayError> for ErrorResponse {
    fn from(e: &RelayError) -> Self {
        Self {
            error: e.to_string(),
            kind: e.kind(),
            status: e.upstream_status(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorResponse::from(&self))).into_response()
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "image-relay",
        "upstream": state.relay.endpoint(),
        "timeout_secs": state.relay.timeout().as_secs(),
    }))
}

/// Relays a data-URL image sent as JSON.
pub async fn process_image(
    State(state): State<Arc<AppState>>,
    request: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Json<ProcessResponse>, Response> {
    let Json(request) = request.map_err(|e| rejected(e.status(), e.body_text()))?;

    let processed_image = state
        .relay
        .relay(&request.image_base64)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(Json(ProcessResponse { processed_image }))
}

/// Relays an image uploaded as a multipart `file` field.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessResponse>, Response> {
    let mut multipart = multipart.map_err(|e| rejected(e.status(), e.body_text()))?;
    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| rejected(e.status(), e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| rejected(e.status(), e.body_text()))?;
        upload = Some((filename, content_type, data.to_vec()));
    }

    let (filename, content_type, data) = upload
        .ok_or_else(|| RelayError::BadInput("No file part".to_string()).into_response())?;
    if filename.is_empty() && data.is_empty() {
        return Err(RelayError::BadInput("No selected file".to_string()).into_response());
    }

    info!("📥 Received upload '{}' ({} bytes)", filename, data.len());

    let image = ImagePayload::new(data, content_type.as_deref());
    let processed = state
        .relay
        .relay_payload(image)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(Json(ProcessResponse {
        processed_image: processed.to_data_url(),
    }))
}

/// Answers a request the extractors refused. Oversized bodies keep their 413,
/// everything else is bad input.
fn rejected(status: StatusCode, reason: String) -> Response {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        let body = ErrorResponse {
            error: "The image is too large to upload.".to_string(),
            kind: ErrorKind::BadInput,
            status: None,
        };
        return (status, Json(body)).into_response();
    }
    RelayError::BadInput(reason).into_response()
}
