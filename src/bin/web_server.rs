//! # Web Server Binary Entry Point
//!
//! Thin wrapper that loads configuration and runs the image relay.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin web_server -- --config config/relay.toml
//! RELAY_UPSTREAM_URL=http://10.0.0.5:8000/process-image/ cargo run --bin web_server
//! ```
//!
//! The server will:
//! 1. Load configuration from the TOML file, if given
//! 2. Apply command-line and environment overrides
//! 3. Serve the upload page and the relay API until Ctrl-C

use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

use image_relay::common::config::{load_config, RelayConfig};

/// Command-line arguments for the web server binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the relay configuration file (TOML format)
    ///
    /// Example: config/relay.toml
    #[arg(short, long)]
    config: Option<String>,

    /// Address to listen on (e.g., 0.0.0.0:3000)
    #[arg(long, env = "RELAY_ADDRESS")]
    address: Option<String>,

    /// Image-processing endpoint receiving the uploads
    #[arg(long, env = "RELAY_UPSTREAM_URL")]
    upstream_url: Option<String>,

    /// Maximum seconds to wait for one processed image
    #[arg(long, env = "RELAY_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

impl Args {
    /// Overrides file values with whatever was given on the command line or
    /// in the environment.
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(address) = &self.address {
            config.server.address = address.clone();
        }
        if let Some(url) = &self.upstream_url {
            config.upstream.url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.upstream.timeout_secs = secs;
        }
    }

    /// Configuration file merged with overrides. Validation happens on the
    /// merged result, so an override can correct a bad file value.
    fn load(&self) -> anyhow::Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => load_config::<RelayConfig>(path)?,
            None => RelayConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }
}

/// Initialize the logging system with timestamp, level, and message formatting.
///
/// INFO level by default; `RUST_LOG` overrides it.
/// Format: `[HH:MM:SS] [LEVEL] message`
fn init_logger() {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();
    let config = args.load()?;

    // serve() validates the merged configuration
    image_relay::server::serve(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image_relay::common::config::ConfigError;

    fn args_with(config: Option<String>) -> Args {
        Args {
            config,
            address: None,
            upstream_url: None,
            timeout_secs: None,
        }
    }

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_override_fixes_invalid_file_values() {
        let file = write_config("[upstream]\nurl = \"not a url\"\ntimeout_secs = 0\n");
        let path = file.path().to_str().unwrap().to_string();

        let plain = args_with(Some(path.clone())).load().unwrap();
        assert!(matches!(
            plain.validate(),
            Err(ConfigError::InvalidUpstreamUrl { .. })
        ));

        let mut args = args_with(Some(path));
        args.upstream_url = Some("http://10.0.0.5:8000/process-image/".to_string());
        args.timeout_secs = Some(30);
        let config = args.load().unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.upstream.url, "http://10.0.0.5:8000/process-image/");
        assert_eq!(config.upstream.timeout_secs, 30);
    }

    #[test]
    fn test_apply_leaves_unset_values_alone() {
        let mut config = RelayConfig::default();
        let mut args = args_with(None);
        args.address = Some("0.0.0.0:8080".to_string());
        args.apply(&mut config);

        assert_eq!(config.server.address, "0.0.0.0:8080");
        assert_eq!(config.upstream.url, RelayConfig::default().upstream.url);
        assert_eq!(config.upstream.timeout_secs, 600);
    }

    #[test]
    fn test_no_config_file_uses_defaults() {
        let config = args_with(None).load().unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.address, "127.0.0.1:3000");
    }
}
