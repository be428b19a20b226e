//! Upstream stream cursor with guaranteed release.
//!
//! A [`StreamSource`] is a single-use, forward-only cursor over upstream
//! records. It owns an optional release hook that runs exactly once: on an
//! explicit [`StreamSource::release`], or when the cursor is dropped (which
//! covers abandoned futures and early returns).

use std::fmt;

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weft_types::{DecodeError, UpstreamEvent};

/// Categories of source failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    /// HTTP status error (4xx, 5xx) or request failure
    HttpStatus,
    /// Connection timeout or request timeout
    Timeout,
    /// Record could not be decoded (invalid JSON, broken SSE framing)
    Parse,
    /// Local I/O failure (replay files)
    Io,
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceErrorKind::HttpStatus => write!(f, "http_status"),
            SourceErrorKind::Timeout => write!(f, "timeout"),
            SourceErrorKind::Parse => write!(f, "parse"),
            SourceErrorKind::Io => write!(f, "io"),
        }
    }
}

/// Transport or decode failure on the cursor itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    /// Error category
    pub kind: SourceErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, preferring `error.message` from a JSON body.
    pub fn http_status(status: u16, body: &str) -> Self {
        if body.is_empty() {
            return Self::new(SourceErrorKind::HttpStatus, format!("HTTP {status}"));
        }
        if let Ok(json) = serde_json::from_str::<Value>(body)
            && let Some(msg) = json
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
        {
            return Self {
                kind: SourceErrorKind::HttpStatus,
                message: format!("HTTP {status}: {msg}"),
                details: Some(body.to_string()),
            };
        }
        Self {
            kind: SourceErrorKind::HttpStatus,
            message: format!("HTTP {status}"),
            details: Some(body.to_string()),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Timeout, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Parse, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Io, message)
    }
}

impl From<DecodeError> for SourceError {
    fn from(err: DecodeError) -> Self {
        Self::parse(err.to_string())
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SourceError {}

/// Result type for source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Boxed stream of upstream records.
pub type UpstreamStream = BoxStream<'static, SourceResult<UpstreamEvent>>;

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Single-use cursor over upstream records.
pub struct StreamSource {
    label: String,
    stream: Option<UpstreamStream>,
    on_release: Option<ReleaseHook>,
}

impl StreamSource {
    pub fn new(label: impl Into<String>, stream: UpstreamStream) -> Self {
        Self {
            label: label.into(),
            stream: Some(stream),
            on_release: None,
        }
    }

    /// Builds a source over an in-memory list of records.
    pub fn from_events(label: impl Into<String>, events: Vec<UpstreamEvent>) -> Self {
        Self::new(label, stream::iter(events.into_iter().map(Ok)).boxed())
    }

    /// Attaches a hook that runs when the cursor is released.
    #[must_use]
    pub fn with_release<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_release = Some(Box::new(hook));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }

    /// Reads the next record. Returns `None` at end-of-stream or once released.
    pub async fn next(&mut self) -> Option<SourceResult<UpstreamEvent>> {
        match self.stream.as_mut() {
            Some(stream) => stream.next().await,
            None => None,
        }
    }

    /// Drops the underlying stream and runs the release hook.
    ///
    /// Idempotent: only the first call has any effect.
    pub fn release(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        drop(stream);
        if let Some(hook) = self.on_release.take() {
            hook();
        }
        tracing::debug!(source = %self.label, "stream source released");
    }
}

impl Drop for StreamSource {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource")
            .field("label", &self.label)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}
