//! # image-relay
//!
//! A small web service that takes an image from the browser, forwards it to
//! an external image-processing service and returns the processed image.
//!
//! - [`common`]: configuration and the data-URL image payload
//! - [`relay`]: the relay operation (upstream call, timeout, error mapping)
//! - [`server`]: the HTTP surface (API routes, static upload page)

pub mod common;
pub mod relay;
pub mod server;

pub use common::data_url::ImagePayload;
pub use relay::{RelayError, RelayMiddleware};
