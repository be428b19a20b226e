//! Helpers shared by stream providers.

use weft_types::UpstreamEvent;

use crate::source::{SourceError, SourceErrorKind, SourceResult};

/// Standard User-Agent header for weft HTTP requests.
pub const USER_AGENT: &str = concat!("weft/", env!("CARGO_PKG_VERSION"));

/// Resolves an API key with precedence: config > env.
///
/// Returns `None` when neither source carries a non-blank key; endpoints
/// behind a local gateway usually need none.
pub fn resolve_api_key(config_api_key: Option<&str>, env_var: &str) -> Option<String> {
    if let Some(key) = config_api_key {
        let trimmed = key.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    std::env::var(env_var)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

/// Resolves a base URL with precedence: env > config > default.
///
/// # Errors
/// Returns an error if the chosen URL does not parse.
pub fn resolve_base_url(
    config_base_url: Option<&str>,
    env_var: &str,
    default_url: &str,
    provider_name: &str,
) -> Result<String, String> {
    if let Ok(env_url) = std::env::var(env_var) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, provider_name)?;
            return Ok(trimmed.to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, provider_name)?;
            return Ok(trimmed.to_string());
        }
    }

    Ok(default_url.to_string())
}

fn validate_url(url: &str, provider_name: &str) -> Result<(), String> {
    url::Url::parse(url)
        .map(|_| ())
        .map_err(|err| format!("Invalid {provider_name} base URL: {url} ({err})"))
}

/// Maps a reqwest failure onto a source error kind.
pub fn classify_reqwest_error(e: &reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::timeout(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        SourceError::timeout(format!("Connection failed: {e}"))
    } else if e.is_request() {
        SourceError::new(SourceErrorKind::HttpStatus, format!("Request error: {e}"))
    } else {
        SourceError::new(SourceErrorKind::HttpStatus, format!("Network error: {e}"))
    }
}

/// Decodes one upstream record payload.
///
/// # Errors
/// Returns a parse error if the payload is not a JSON object.
pub fn decode_record(data: &str) -> SourceResult<UpstreamEvent> {
    UpstreamEvent::decode(data).map_err(|err| {
        let mut source_err = SourceError::from(err);
        source_err.details = Some(truncate_for_error(data, 200));
        source_err
    })
}

fn truncate_for_error(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
