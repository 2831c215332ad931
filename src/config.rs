//! Environment-driven server configuration.

use std::path::PathBuf;

use chrono::Duration;

use crate::registry::DEFAULT_TTL_SECS;

/// Configuration for the ACDL server binary.
///
/// # Environment Variables
///
/// - `PORT` — HTTP port (default: 8080)
/// - `ACDL_TTL_SECS` — registration TTL in seconds (default: 600)
/// - `ACDL_MANIFEST_DIR` — optional directory of manifest files to seed
///   the registry from at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub ttl: Duration,
    pub manifest_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let ttl_secs = std::env::var("ACDL_TTL_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(DEFAULT_TTL_SECS);
        let manifest_dir = std::env::var("ACDL_MANIFEST_DIR").ok().map(PathBuf::from);

        Self {
            port,
            ttl: Duration::seconds(ttl_secs),
            manifest_dir,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
            manifest_dir: None,
        }
    }
}
