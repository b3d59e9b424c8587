//! # Common Components
//!
//! ## Modules
//!
//! - [`config`]: TOML configuration for the server and the upstream service
//! - [`data_url`]: conversion between data URLs and binary image payloads

pub mod config;
pub mod data_url;
