//! API key resolution for upstream calls.

use axum::http::HeaderMap;

use super::error::ApiError;
use crate::config::Config;

/// Header the caller may use to supply its own key.
pub const CLIENT_KEY_HEADER: &str = "x-api-key";

/// Header the generation API expects the key in.
pub const UPSTREAM_KEY_HEADER: &str = "x-freepik-api-key";

/// Pick the key for an upstream call.
///
/// A server-configured key always wins over the caller's header.
pub fn resolve_api_key(config: &Config, headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(key) = &config.api_key {
        return Ok(key.clone());
    }
    headers
        .get(CLIENT_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: Option<&str>) -> Config {
        Config::new(
            key.map(str::to_string),
            "http://upstream".to_string(),
            "http://host".to_string(),
        )
    }

    fn headers(key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CLIENT_KEY_HEADER, key.parse().unwrap());
        headers
    }

    #[test]
    fn server_key_overrides_header() {
        let key = resolve_api_key(&config(Some("server")), &headers("client")).unwrap();
        assert_eq!(key, "server");
    }

    #[test]
    fn header_key_used_without_server_key() {
        let key = resolve_api_key(&config(None), &headers("client")).unwrap();
        assert_eq!(key, "client");
    }

    #[test]
    fn missing_or_blank_key_is_unauthorized() {
        assert!(matches!(
            resolve_api_key(&config(None), &HeaderMap::new()),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            resolve_api_key(&config(None), &headers("   ")),
            Err(ApiError::Unauthorized)
        ));
    }
}
