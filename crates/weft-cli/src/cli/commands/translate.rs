//! Translate command handler.

use std::path::PathBuf;

use anyhow::{Context, Result};
use weft_core::config::Config;
use weft_core::providers::{ProviderRef, ProviderSelection, resolve_provider};
use weft_core::{ModelAccess, StreamOptions, Translator, interrupt};

use crate::render::{EventRenderer, OutputFormat};

pub struct TranslateOptions<'a> {
    pub config: &'a Config,
    pub provider_override: Option<&'a str>,
    pub model_override: Option<&'a str>,
    pub input: Option<PathBuf>,
    pub prompt: Option<String>,
    pub format: OutputFormat,
}

pub async fn run(options: TranslateOptions<'_>) -> Result<()> {
    let config = options.config;
    let model = options.model_override.unwrap_or(&config.model);
    let selection = select(options.provider_override, model, &config.provider);
    let provider_id = selection.provider.to_string();

    let stream_options = StreamOptions {
        path: options.input,
        prompt: options.prompt,
        ..StreamOptions::default()
    };

    let access = ModelAccess::new(&config.providers);
    let source = access
        .resolve(&provider_id, &selection.model, &stream_options)
        .await
        .with_context(|| format!("open stream for {provider_id}:{}", selection.model))?;

    let mut renderer = EventRenderer::new(options.format);
    let translator = Translator::new(config.translator);

    // Dropping the translation future drops the source, which releases it.
    let translation = translator.process_stream(source, |event| renderer.handle_event(&event));
    let outcome = tokio::select! {
        result = translation => Some(result),
        () = interrupt::wait_for_interrupt() => None,
    };

    let Some(result) = outcome else {
        renderer.interrupted();
        tracing::info!("stream abandoned on interrupt");
        return Err(interrupt::InterruptedError.into());
    };

    renderer.finish();
    let text = result.context("translate stream")?;
    tracing::debug!(text_len = text.len(), "translate finished");
    Ok(())
}

/// An explicit `--provider` wins over any `provider:` prefix in the model.
fn select(
    provider_override: Option<&str>,
    model: &str,
    default_provider: &str,
) -> ProviderSelection {
    match provider_override.map(str::trim).filter(|p| !p.is_empty()) {
        Some(provider) => ProviderSelection {
            provider: ProviderRef::parse(provider),
            model: model.trim().to_string(),
        },
        None => resolve_provider(model, default_provider),
    }
}
