//! # Configuration
//!
//! TOML configuration for the relay server and its upstream processing
//! service. Every field has a default, so a configuration file is optional
//! and a partial file only overrides what it names.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

/// Default address of the external image-processing service.
pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:8000/process-image/";

/// Default upper bound on one upstream call. The processing backend is
/// CPU-bound and can take minutes on large images.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Example
/// ```ignore
/// let config: RelayConfig = load_config("config/relay.toml")?;
/// ```
pub fn load_config<T>(path: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)?;
    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Problems found by [`RelayConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid upstream URL '{url}': {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },

    #[error("upstream URL '{0}' must use http or https")]
    UnsupportedScheme(String),

    #[error("upstream timeout must be greater than zero")]
    ZeroTimeout,

    #[error("invalid listen address '{0}'")]
    InvalidAddress(String),
}

/// Complete relay configuration.
///
/// # Example TOML
///
/// ```toml
/// [server]
/// address = "127.0.0.1:3000"
/// static_dir = "frontend"
///
/// [upstream]
/// url = "http://127.0.0.1:8000/process-image/"
/// timeout_secs = 600
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerInfo,
    pub upstream: UpstreamConfig,
}

/// Where the relay listens and what it serves besides the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    /// Listen address (e.g., "127.0.0.1:3000")
    pub address: String,
    /// Directory holding the upload page, served for every non-API path
    pub static_dir: String,
    /// Largest accepted request body. Data URLs are a third larger than the image.
    pub max_body_bytes: usize,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            static_dir: "frontend".to_string(),
            max_body_bytes: 25 * 1024 * 1024,
        }
    }
}

/// The external processing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Endpoint receiving the multipart upload
    pub url: String,
    /// Maximum wait for one processing call, in seconds
    pub timeout_secs: u64,
    /// Route upstream calls through HTTP(S)_PROXY. Off by default since the
    /// processing service normally runs next to the relay.
    pub use_system_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_UPSTREAM_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            use_system_proxy: false,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RelayConfig {
    /// Loads and validates a configuration file.
    pub fn from_file(path: &str) -> Result<Self> {
        let config: RelayConfig = load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values a TOML parse cannot: URL shape, scheme, timeout and
    /// listen address.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.upstream.url).map_err(|e| {
            ConfigError::InvalidUpstreamUrl {
                url: self.upstream.url.clone(),
                reason: e.to_string(),
            }
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::UnsupportedScheme(self.upstream.url.clone()));
        }

        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        if self.server.address.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidAddress(self.server.address.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = RelayConfig::default();
        assert_eq!(config.upstream.url, DEFAULT_UPSTREAM_URL);
        assert_eq!(config.upstream.timeout(), Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[upstream]\ntimeout_secs = 30").unwrap();

        let config = RelayConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.upstream.timeout_secs, 30);
        assert_eq!(config.upstream.url, DEFAULT_UPSTREAM_URL);
        assert_eq!(config.server.address, "127.0.0.1:3000");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RelayConfig::default();
        config.upstream.url = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUpstreamUrl { .. })
        ));

        config.upstream.url = "ftp://127.0.0.1/process".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnsupportedScheme(
                "ftp://127.0.0.1/process".to_string()
            ))
        );

        config.upstream.url = DEFAULT_UPSTREAM_URL.to_string();
        config.upstream.timeout_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));

        config.upstream.timeout_secs = 5;
        config.server.address = "localhost".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[upstream\nurl = 3").unwrap();
        assert!(RelayConfig::from_file(file.path().to_str().unwrap()).is_err());
    }
}
