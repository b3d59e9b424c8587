//! # Upstream Client
//!
//! Sends one image to the external processing service and returns what it
//! answers with. Timeouts are not handled here; the caller bounds the call
//! by dropping the returned future.

use async_trait::async_trait;
use log::debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};

use crate::common::config::UpstreamConfig;
use crate::common::data_url::ImagePayload;
use crate::relay::RelayError;

/// Multipart field the processing service reads the image from.
pub const UPLOAD_FIELD: &str = "file";

/// File name attached to the uploaded part.
pub const UPLOAD_FILE_NAME: &str = "image.png";

/// Something that turns one image into another.
///
/// [`HttpUpstream`] is the production implementation; tests substitute
/// scripted ones.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Processes one image. Must not retry.
    async fn process(&self, image: ImagePayload) -> Result<ImagePayload, RelayError>;

    /// Human-readable location of the service, for logs and the health check.
    fn endpoint(&self) -> &str;
}

/// The processing service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    http: reqwest::Client,
    url: String,
}

impl HttpUpstream {
    /// Builds the HTTP client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Fails only when the TLS backend cannot be initialized.
    pub fn new(config: &UpstreamConfig) -> reqwest::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        Ok(Self {
            http: builder.build()?,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn process(&self, image: ImagePayload) -> Result<ImagePayload, RelayError> {
        let ImagePayload { mime_type, bytes } = image;

        let part = Part::bytes(bytes)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(&mime_type)
            .map_err(|e| {
                RelayError::BadInput(format!("unusable content type '{}': {}", mime_type, e))
            })?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .http
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RelayError::UpstreamUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::UpstreamFailure {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::UpstreamUnreachable(e.to_string()))?;

        debug!(
            "Upstream answered {} with {} bytes ({})",
            status,
            body.len(),
            content_type.as_deref().unwrap_or("no content type")
        );

        Ok(ImagePayload::new(body.to_vec(), content_type.as_deref()))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
