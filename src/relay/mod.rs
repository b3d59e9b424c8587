//! # Relay Components
//!
//! The relay is split the same way as the rest of the service: a core that
//! talks to the processing service and a middleware that wraps each call.
//!
//! ## Upstream Client ([`client`])
//! Builds the multipart upload, sends it and turns the answer back into an
//! [`ImagePayload`](crate::common::data_url::ImagePayload).
//!
//! ## Relay Middleware ([`middleware`])
//! - Input validation and data-URL decoding
//! - The per-call timeout and cancellation
//! - Failure classification and logging

pub mod client;
pub mod error;
pub mod middleware;

pub use client::{HttpUpstream, Upstream};
pub use error::{ErrorKind, RelayError};
pub use middleware::{RelayMiddleware, RelayStage};
