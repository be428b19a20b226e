//! Model access layer: resolves a provider and model into a stream source.
//!
//! Providers form a closed set dispatched with a `match`; ids that name no
//! implementation resolve to [`ProviderRef::Unsupported`] and fail with a
//! typed [`AccessError`].

use std::fmt;
use std::path::PathBuf;

use serde_json::{Map, Value};

pub mod http;
pub mod replay;
pub mod shared;
pub mod sse;

pub use shared::{USER_AGENT, decode_record, resolve_api_key, resolve_base_url};

use self::http::{HttpClient, HttpConfig};
use self::replay::{ReplayClient, ReplayConfig};
use crate::config::ProvidersConfig;
use crate::source::{SourceError, StreamSource};

/// Supported stream providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Replay,
    Http,
}

impl ProviderKind {
    /// Returns all provider kinds.
    pub fn all() -> &'static [ProviderKind] {
        &[ProviderKind::Replay, ProviderKind::Http]
    }

    /// Returns the string identifier used in config files and on the CLI.
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::Replay => "replay",
            ProviderKind::Http => "http",
        }
    }

    /// Returns the `ProviderKind` for a given id string.
    pub fn from_id(id: &str) -> Option<ProviderKind> {
        match id.trim().to_lowercase().as_str() {
            "replay" | "file" => Some(ProviderKind::Replay),
            "http" | "sse" => Some(ProviderKind::Http),
            _ => None,
        }
    }

    /// Returns the human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::Replay => "Replay (JSON Lines file)",
            ProviderKind::Http => "HTTP (server-sent events)",
        }
    }
}

/// A provider reference: a supported kind or an id with no implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderRef {
    Kind(ProviderKind),
    Unsupported(String),
}

impl ProviderRef {
    pub fn parse(id: &str) -> Self {
        ProviderKind::from_id(id).map_or_else(
            || ProviderRef::Unsupported(id.trim().to_string()),
            ProviderRef::Kind,
        )
    }
}

impl fmt::Display for ProviderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderRef::Kind(kind) => write!(f, "{}", kind.id()),
            ProviderRef::Unsupported(id) => write!(f, "{id}"),
        }
    }
}

/// Provider selection result with normalized model ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelection {
    pub provider: ProviderRef,
    pub model: String,
}

/// Splits a `provider:model` string; without a prefix, `default_provider` is used.
pub fn resolve_provider(model: &str, default_provider: &str) -> ProviderSelection {
    let trimmed = model.trim();
    if let Some((prefix, rest)) = trimmed.split_once(':') {
        let rest = rest.trim();
        if !rest.is_empty() {
            return ProviderSelection {
                provider: ProviderRef::parse(prefix),
                model: rest.to_string(),
            };
        }
    }
    ProviderSelection {
        provider: ProviderRef::parse(default_provider),
        model: trimmed.to_string(),
    }
}

/// Per-request options handed to the resolved provider.
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Input file (replay provider).
    pub path: Option<PathBuf>,
    /// Prompt forwarded to remote providers.
    pub prompt: Option<String>,
    /// Extra request parameters forwarded verbatim.
    pub params: Map<String, Value>,
}

/// Failure to resolve a stream source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The provider id has no implementation.
    UnsupportedProvider { provider: String },
    /// Provider configuration is incomplete or invalid.
    Config {
        provider: ProviderKind,
        message: String,
    },
    /// The provider failed while opening the stream.
    Source(SourceError),
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::UnsupportedProvider { provider } => {
                let known: Vec<&str> = ProviderKind::all().iter().map(ProviderKind::id).collect();
                write!(
                    f,
                    "Unsupported provider '{provider}'. Valid options: {}",
                    known.join(", ")
                )
            }
            AccessError::Config { provider, message } => {
                write!(f, "{} provider misconfigured: {message}", provider.label())
            }
            AccessError::Source(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AccessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AccessError::Source(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SourceError> for AccessError {
    fn from(err: SourceError) -> Self {
        AccessError::Source(err)
    }
}

enum ProviderClient {
    Replay(ReplayClient),
    Http(HttpClient),
}

impl ProviderClient {
    async fn open_stream(&self, options: &StreamOptions) -> Result<StreamSource, AccessError> {
        let source = match self {
            ProviderClient::Replay(client) => client.open_stream().await?,
            ProviderClient::Http(client) => {
                client
                    .open_stream(options.prompt.as_deref(), &options.params)
                    .await?
            }
        };
        Ok(source)
    }
}

/// Entry point of the model access layer.
///
/// Built once from an immutable provider configuration and passed by
/// reference to whoever needs to open streams.
#[derive(Debug, Clone, Copy)]
pub struct ModelAccess<'a> {
    config: &'a ProvidersConfig,
}

impl<'a> ModelAccess<'a> {
    pub fn new(config: &'a ProvidersConfig) -> Self {
        Self { config }
    }

    /// Resolves `provider_id` and `model_id` into a ready stream source.
    ///
    /// # Errors
    /// Returns `UnsupportedProvider` for unknown ids, `Config` for missing or
    /// invalid settings, and `Source` if opening the stream fails.
    pub async fn resolve(
        &self,
        provider_id: &str,
        model_id: &str,
        options: &StreamOptions,
    ) -> Result<StreamSource, AccessError> {
        let client = self.build_client(&ProviderRef::parse(provider_id), model_id, options)?;
        tracing::info!(provider = provider_id, model = model_id, "opening stream");
        client.open_stream(options).await
    }

    fn build_client(
        &self,
        provider: &ProviderRef,
        model_id: &str,
        options: &StreamOptions,
    ) -> Result<ProviderClient, AccessError> {
        match provider {
            ProviderRef::Kind(ProviderKind::Replay) => {
                let config = ReplayConfig::resolve(options.path.as_deref(), &self.config.replay)
                    .ok_or_else(|| AccessError::Config {
                        provider: ProviderKind::Replay,
                        message: "no input file; pass --input or set [providers.replay] path"
                            .to_string(),
                    })?;
                Ok(ProviderClient::Replay(ReplayClient::new(config)))
            }
            ProviderRef::Kind(ProviderKind::Http) => {
                let config = HttpConfig::from_env(model_id.to_string(), &self.config.http)
                    .map_err(|message| AccessError::Config {
                        provider: ProviderKind::Http,
                        message,
                    })?;
                Ok(ProviderClient::Http(HttpClient::new(config)?))
            }
            ProviderRef::Unsupported(id) => Err(AccessError::UnsupportedProvider {
                provider: id.clone(),
            }),
        }
    }
}
