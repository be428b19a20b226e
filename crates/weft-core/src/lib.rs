//! Core weft library (translator, stream sources, providers, config).

pub mod config;
pub mod interrupt;
pub mod logging;
pub mod providers;
pub mod source;
pub mod translator;

pub use config::Config;
pub use providers::{AccessError, ModelAccess, ProviderKind, StreamOptions};
pub use source::{SourceError, SourceErrorKind, SourceResult, StreamSource};
pub use translator::{NormalizedStream, Phase, Translator, TranslatorOptions, process_stream};
