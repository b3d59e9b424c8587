//! # Relay Errors
//!
//! Every way a relay invocation can fail. Each variant carries the
//! user-facing message (its `Display`), a machine-readable [`ErrorKind`] and
//! the HTTP status the server answers with.

use axum::http::StatusCode;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed or missing image data. No upstream call was made.
    #[error("Invalid image data: {0}")]
    BadInput(String),

    /// The upstream call did not finish within the configured bound and was abandoned.
    #[error(
        "Image processing took too long (over {} seconds). Please try a smaller image.",
        .limit.as_secs()
    )]
    Timeout { limit: Duration },

    /// The upstream answered with a non-success status.
    #[error("Image processing service failed with status: {status}")]
    UpstreamFailure { status: u16 },

    /// The upstream could not be reached or the exchange broke off.
    /// The reason is kept for logs and is not shown to callers.
    #[error("Failed to communicate with the image processing service.")]
    UpstreamUnreachable(String),
}

/// Classification of a [`RelayError`], serialized into error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadInput,
    Timeout,
    UpstreamFailure,
    UpstreamUnreachable,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadInput => "bad_input",
            ErrorKind::Timeout => "timeout",
            ErrorKind::UpstreamFailure => "upstream_failure",
            ErrorKind::UpstreamUnreachable => "upstream_unreachable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::BadInput(_) => ErrorKind::BadInput,
            RelayError::Timeout { .. } => ErrorKind::Timeout,
            RelayError::UpstreamFailure { .. } => ErrorKind::UpstreamFailure,
            RelayError::UpstreamUnreachable(_) => ErrorKind::UpstreamUnreachable,
        }
    }

    /// Status the relay answers its own caller with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::BadInput(_) => StatusCode::BAD_REQUEST,
            RelayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RelayError::UpstreamFailure { .. } | RelayError::UpstreamUnreachable(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// Status reported by the upstream, when it answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            RelayError::UpstreamFailure { status } => Some(*status),
            _ => None,
        }
    }
}
