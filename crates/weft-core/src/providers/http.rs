//! HTTP provider: streams upstream records from an SSE endpoint.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Map, Value, json};

use super::shared::{self, classify_reqwest_error, resolve_api_key, resolve_base_url};
use super::sse::SseDecoder;
use crate::config::HttpProviderConfig;
use crate::source::{SourceError, SourceResult, StreamSource};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787";
const STREAM_PATH: &str = "/v1/stream";

/// HTTP provider configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub connect_timeout: Option<Duration>,
}

impl HttpConfig {
    /// Creates a new config from the config file and environment.
    ///
    /// Environment variables:
    /// - `WEFT_HTTP_API_KEY` (fallback if not in config)
    /// - `WEFT_HTTP_BASE_URL` (overrides config)
    ///
    /// # Errors
    /// Returns an error if the resolved base URL is invalid.
    pub fn from_env(model: String, config: &HttpProviderConfig) -> Result<Self, String> {
        let api_key = resolve_api_key(config.api_key.as_deref(), "WEFT_HTTP_API_KEY");
        let base_url = resolve_base_url(
            config.base_url.as_deref(),
            "WEFT_HTTP_BASE_URL",
            DEFAULT_BASE_URL,
            "HTTP",
        )?;

        Ok(Self {
            api_key,
            base_url,
            model,
            connect_timeout: config.connect_timeout(),
        })
    }
}

/// Client for an SSE streaming endpoint.
pub struct HttpClient {
    config: HttpConfig,
    http: reqwest::Client,
}

impl HttpClient {
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: HttpConfig) -> SourceResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().map_err(|e| classify_reqwest_error(&e))?;
        Ok(Self { config, http })
    }

    /// Sends the request and returns the response body as a stream source.
    ///
    /// # Errors
    /// Returns an error on network failures and non-2xx responses.
    pub async fn open_stream(
        &self,
        prompt: Option<&str>,
        params: &Map<String, Value>,
    ) -> SourceResult<StreamSource> {
        let url = format!("{}{STREAM_PATH}", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "params": params,
        });

        let response = self
            .http
            .post(&url)
            .headers(self.build_headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SourceError::http_status(status.as_u16(), &error_body));
        }

        tracing::debug!(url = %url, model = %self.config.model, "http stream opened");
        let records = SseDecoder::new(response.bytes_stream());
        let label = format!("http:{}", self.config.model);
        Ok(StreamSource::new(label, records.boxed()).with_release(move || {
            tracing::debug!(url = %url, "http stream closed");
        }))
    }

    fn build_headers(&self) -> SourceResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(USER_AGENT, HeaderValue::from_static(shared::USER_AGENT));
        if let Some(key) = &self.config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|err| SourceError::parse(format!("Invalid API key header: {err}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}
