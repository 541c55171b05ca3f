//! Configuration management for the motion proxy.
//!
//! Configuration can be set via environment variables:
//! - `FREEPIK_API_KEY` - Optional. Process-wide API key; overrides any key sent by callers.
//! - `FREEPIK_API_BASE` - Optional. Base URL of the generation API. Defaults to `https://api.freepik.com`.
//! - `UPLOAD_HOST_URL` - Optional. Anonymous file host endpoint. Defaults to `https://catbox.moe/user/api.php`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `MAX_UPLOAD_MB` - Optional. Upload size limit in MiB. Defaults to `200`.

use thiserror::Error;

/// Default base URL of the generation API.
pub const DEFAULT_API_BASE: &str = "https://api.freepik.com";

/// Default anonymous file host endpoint.
pub const DEFAULT_UPLOAD_HOST_URL: &str = "https://catbox.moe/user/api.php";

/// Default upload limit (200 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 200 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Proxy configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Process-wide API key. When set it is used for every upstream call.
    pub api_key: Option<String>,

    /// Base URL of the generation API (no trailing slash)
    pub api_base: String,

    /// Endpoint of the anonymous file host
    pub upload_url: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Largest accepted upload, in bytes
    pub max_upload_bytes: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `PORT` or `MAX_UPLOAD_MB` cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env_non_empty("FREEPIK_API_KEY");

        let api_base = env_non_empty("FREEPIK_API_BASE")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let upload_url = env_non_empty("UPLOAD_HOST_URL")
            .unwrap_or_else(|| DEFAULT_UPLOAD_HOST_URL.to_string());

        let host = env_non_empty("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = env_non_empty("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let max_upload_bytes = env_non_empty("MAX_UPLOAD_MB")
            .map(|v| parse_upload_limit(&v))
            .transpose()?
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Ok(Self {
            api_key,
            api_base,
            upload_url,
            host,
            port,
            max_upload_bytes,
        })
    }

    /// Create a config with custom upstream URLs (useful for testing).
    pub fn new(api_key: Option<String>, api_base: String, upload_url: String) -> Self {
        Self {
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_url,
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Whether a process-wide API key is configured.
    pub fn has_server_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Megabytes to bytes, rejecting values that do not fit in a `u64`.
fn parse_upload_limit(value: &str) -> Result<u64, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue("MAX_UPLOAD_MB".to_string(), reason);
    let mb = value
        .trim()
        .parse::<u64>()
        .map_err(|e| invalid(format!("{}", e)))?;
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| invalid(format!("{}MB exceeds the largest supported size", mb)))
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
