//! SSE decoding of upstream records from a streaming response body.

use std::pin::Pin;
use std::task::{Context, Poll};

use eventsource_stream::{EventStream, Eventsource};
use futures_util::Stream;
use weft_types::UpstreamEvent;

use super::shared::decode_record;
use crate::source::{SourceError, SourceResult};

/// Sentinel `data:` payload some servers send before closing the stream.
const DONE_SENTINEL: &str = "[DONE]";

/// SSE decoder that turns a byte stream into upstream records.
///
/// Every non-empty `data:` payload is one JSON record; the SSE `event:`
/// name is ignored because records carry their own `type`.
pub struct SseDecoder<S> {
    inner: EventStream<S>,
    done: bool,
}

impl<S> SseDecoder<S> {
    pub fn new(stream: S) -> Self
    where
        S: Eventsource,
    {
        Self {
            inner: stream.eventsource(),
            done: false,
        }
    }
}

impl<S, E> Stream for SseDecoder<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = SourceResult<UpstreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        continue;
                    }
                    if data == DONE_SENTINEL {
                        self.done = true;
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(decode_record(data)));
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(SourceError::parse(format!(
                        "SSE stream error: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
