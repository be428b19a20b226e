//! Replay provider: reads upstream records from a JSON Lines file.
//!
//! One record per line; blank lines are skipped. Useful for reproducing a
//! captured stream and for offline tests.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use futures_util::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::shared::decode_record;
use crate::config::ReplayProviderConfig;
use crate::source::{SourceError, SourceResult, StreamSource};

/// Replay provider configuration.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub path: PathBuf,
}

impl ReplayConfig {
    /// Resolves the replay file: explicit option > `[providers.replay] path`.
    pub fn resolve(option_path: Option<&Path>, config: &ReplayProviderConfig) -> Option<Self> {
        option_path
            .map(Path::to_path_buf)
            .or_else(|| config.effective_path().map(PathBuf::from))
            .map(|path| Self { path })
    }
}

pub struct ReplayClient {
    config: ReplayConfig,
}

impl ReplayClient {
    pub fn new(config: ReplayConfig) -> Self {
        Self { config }
    }

    /// Opens the replay file as a stream source.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be opened.
    pub async fn open_stream(&self) -> SourceResult<StreamSource> {
        let path = self.config.path.clone();
        let file = tokio::fs::File::open(&path).await.map_err(|err| {
            SourceError::io(format!("Failed to open replay file {}: {err}", path.display()))
        })?;

        let lines = BufReader::new(file).lines();
        let records = stream::unfold((lines, 0usize), |(mut lines, mut line_no)| async move {
            loop {
                line_no += 1;
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => {
                        let record = decode_record(&line).map_err(|mut err| {
                            err.message = format!("line {line_no}: {}", err.message);
                            err
                        });
                        return Some((record, (lines, line_no)));
                    }
                    Ok(None) => return None,
                    Err(err) => {
                        let err = SourceError::io(format!("line {line_no}: read failed: {err}"));
                        return Some((Err(err), (lines, line_no)));
                    }
                }
            }
        });

        let label = format!("replay:{}", path.display());
        tracing::debug!(path = %path.display(), "replay file opened");
        Ok(StreamSource::new(label, records.boxed()).with_release(move || {
            tracing::debug!(path = %path.display(), "replay file closed");
        }))
    }
}
