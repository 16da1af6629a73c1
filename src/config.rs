//! Runtime configuration.
//!
//! Every field has a default, so an empty file (or no file at all) gives a
//! working local setup:
//!
//! ```toml
//! listen = "127.0.0.1:8081"
//!
//! [cors]
//! allow_origin = "*"
//! allow_methods = "GET, PUT, POST, DELETE"
//! allow_headers = "Content-Type"
//! max_age = 1728000
//! ```

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Listener address, `host:port`.
    pub listen: String,

    /// Cross-origin headers sent with every response.
    pub cors: CorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8081".to_owned(),
            cors: CorsConfig::default(),
        }
    }
}

impl Config {
    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        Ok(toml::from_str(content)?)
    }

    /// The parsed listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, Error> {
        self.listen.parse().map_err(|source| Error::ListenAddr {
            addr: self.listen.clone(),
            source,
        })
    }
}

/// CORS response headers.
///
/// Browsers send an `OPTIONS` preflight before cross-origin writes; the
/// façade answers it from these values without routing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
    /// Preflight cache lifetime, in seconds.
    pub max_age: u32,
    /// Response headers scripts may read. Empty means none are listed.
    pub expose_headers: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_owned(),
            allow_methods: "GET, PUT, POST, DELETE".to_owned(),
            allow_headers: "Content-Type".to_owned(),
            max_age: 1_728_000,
            expose_headers: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.listen_addr().unwrap(), "127.0.0.1:8081".parse().unwrap());
        assert_eq!(config.cors.max_age, 1_728_000);
    }

    #[test]
    fn partial_cors_table_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            listen = "0.0.0.0:9000"

            [cors]
            allow_origin = "http://localhost:3000"
            "#,
        )
        .unwrap();
        assert_eq!(config.listen, "0.0.0.0:9000");
        assert_eq!(config.cors.allow_origin, "http://localhost:3000");
        assert_eq!(config.cors.allow_methods, "GET, PUT, POST, DELETE");
    }

    #[test]
    fn bad_listen_address_is_reported() {
        let config = Config::from_toml_str(r#"listen = "localhost""#).unwrap();
        let err = config.listen_addr().unwrap_err();
        assert!(matches!(err, Error::ListenAddr { ref addr, .. } if addr == "localhost"));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = Config::from_toml_str("listen = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::load("/nonexistent/fascia.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
