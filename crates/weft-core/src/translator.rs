//! Translator from upstream records to normalized events.
//!
//! The translator pulls one record at a time from a [`StreamSource`],
//! updates its accumulator and emits zero or more [`NormalizedEvent`]s in
//! order. Reasoning and answer text arrive without explicit boundaries; the
//! translator closes a reasoning run (`ThinkingComplete`) when the next
//! text delta arrives. After a `finish` or `error` record the stream is
//! done and later records produce nothing.

use std::collections::VecDeque;

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use weft_types::{ImageContent, NormalizedEvent, ToolDescriptor, UpstreamEvent, Usage};

use crate::source::{SourceResult, StreamSource};

/// MIME type used for generated files that arrive without one.
const DEFAULT_FILE_MIME_TYPE: &str = "application/octet-stream";

/// Boxed single-pass stream of normalized events.
pub type NormalizedStream = BoxStream<'static, SourceResult<NormalizedEvent>>;

/// Translator behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorOptions {
    /// Emit `ThinkingComplete` for pending reasoning when the stream ends
    /// (finish or error) before any text delta closed the reasoning run.
    pub flush_reasoning_on_terminal: bool,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self {
            flush_reasoning_on_terminal: true,
        }
    }
}

/// Lifecycle phase of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Reasoning,
    Answering,
    Done,
}

#[derive(Debug, Default)]
struct Accumulator {
    text: String,
    reasoning: String,
    phase: Phase,
}

impl Accumulator {
    fn enter_reasoning(&mut self) {
        if self.phase != Phase::Done {
            self.phase = Phase::Reasoning;
        }
    }

    /// Takes the pending reasoning run, leaving the buffer empty.
    fn take_reasoning(&mut self) -> Option<String> {
        (!self.reasoning.is_empty()).then(|| std::mem::take(&mut self.reasoning))
    }
}

/// Per-stream translator. Never shared between streams.
#[derive(Debug, Default)]
pub struct Translator {
    options: TranslatorOptions,
    acc: Accumulator,
    ignored_after_done: usize,
}

impl Translator {
    pub fn new(options: TranslatorOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        self.acc.phase
    }

    pub fn is_done(&self) -> bool {
        self.acc.phase == Phase::Done
    }

    /// Answer text accumulated so far.
    pub fn text(&self) -> &str {
        &self.acc.text
    }

    /// Reasoning text not yet closed by a `ThinkingComplete`.
    pub fn pending_reasoning(&self) -> &str {
        &self.acc.reasoning
    }

    /// Consumes the translator, returning the accumulated answer text.
    pub fn into_text(self) -> String {
        self.acc.text
    }

    /// Applies one upstream record, emitting normalized events to `sink`.
    pub fn step<F>(&mut self, event: UpstreamEvent, sink: &mut F)
    where
        F: FnMut(NormalizedEvent),
    {
        if self.is_done() {
            self.ignored_after_done += 1;
            tracing::debug!(kind = event.kind(), "ignoring record after terminal outcome");
            return;
        }

        match event {
            UpstreamEvent::TextDelta { text_delta } => {
                self.acc.text.push_str(&text_delta);
                self.acc.phase = Phase::Answering;
                sink(NormalizedEvent::TextDelta { text: text_delta });
                if let Some(reasoning) = self.acc.take_reasoning() {
                    sink(NormalizedEvent::ThinkingComplete { text: reasoning });
                }
            }
            UpstreamEvent::ReasoningDelta { text_delta } => {
                self.acc.enter_reasoning();
                self.acc.reasoning.push_str(&text_delta);
                sink(NormalizedEvent::ThinkingDelta { text: text_delta });
            }
            UpstreamEvent::ReasoningSignature { signature } => {
                self.acc.enter_reasoning();
                sink(NormalizedEvent::ThinkingComplete { text: signature });
            }
            UpstreamEvent::RedactedReasoning { data } => {
                self.acc.enter_reasoning();
                sink(NormalizedEvent::ThinkingDelta { text: data });
            }
            UpstreamEvent::ToolCallStart {
                tool_call_id,
                tool_name,
            } => sink(NormalizedEvent::ToolCreated {
                tool: ToolDescriptor::invoking(tool_call_id, tool_name),
                arguments: json!({}),
            }),
            UpstreamEvent::ToolCallDelta {
                tool_call_id,
                tool_name,
                args_text_delta,
            } => sink(NormalizedEvent::ToolInProgress {
                tool: ToolDescriptor::invoking(tool_call_id, tool_name),
                arguments_delta: args_text_delta,
            }),
            UpstreamEvent::ToolCallComplete {
                tool_call_id,
                tool_name,
                args,
            } => sink(NormalizedEvent::ToolCreated {
                tool: ToolDescriptor::invoking(tool_call_id, tool_name),
                arguments: args,
            }),
            UpstreamEvent::ToolResult {
                tool_call_id,
                tool_name,
                args,
                result,
            } => sink(NormalizedEvent::ToolComplete {
                tool: ToolDescriptor::done(tool_call_id, tool_name),
                arguments: args,
                result,
            }),
            UpstreamEvent::StepFinish { usage, .. } => sink(NormalizedEvent::BlockComplete {
                text: self.acc.text.clone(),
                reasoning: self.acc.reasoning.clone(),
                usage: Usage::from(usage.as_ref()),
            }),
            UpstreamEvent::Finish {
                usage,
                finish_reason,
            } => {
                let reasoning = self.acc.reasoning.clone();
                self.flush_on_terminal(sink);
                sink(NormalizedEvent::TextComplete {
                    text: self.acc.text.clone(),
                });
                sink(NormalizedEvent::ResponseComplete {
                    text: self.acc.text.clone(),
                    reasoning,
                    usage: Usage::from(usage.as_ref()),
                    finish_reason,
                });
                self.acc.phase = Phase::Done;
            }
            UpstreamEvent::Source { source } => sink(NormalizedEvent::KnowledgeComplete {
                id: source.id,
                title: source.title,
                url: source.url,
            }),
            UpstreamEvent::File { base64, mime_type } => sink(NormalizedEvent::ImageComplete {
                image: ImageContent {
                    mime_type: mime_type.unwrap_or_else(|| DEFAULT_FILE_MIME_TYPE.to_string()),
                    data: base64,
                },
            }),
            UpstreamEvent::Error { error, message } => {
                self.flush_on_terminal(sink);
                sink(NormalizedEvent::error(error_message(&error, message)));
                self.acc.phase = Phase::Done;
            }
            UpstreamEvent::Unrecognized { kind } => {
                if UpstreamEvent::is_known_kind(&kind) {
                    tracing::warn!(kind = %kind, "dropping malformed upstream record");
                } else {
                    tracing::debug!(kind = %kind, "dropping unrecognized upstream record");
                }
            }
        }
    }

    fn flush_on_terminal<F>(&mut self, sink: &mut F)
    where
        F: FnMut(NormalizedEvent),
    {
        if !self.options.flush_reasoning_on_terminal {
            return;
        }
        if let Some(reasoning) = self.acc.take_reasoning() {
            sink(NormalizedEvent::ThinkingComplete { text: reasoning });
        }
    }

    /// Pumps `source` to end-of-stream, emitting to `sink`, and returns the
    /// final answer text.
    ///
    /// The source is released exactly once whatever the outcome. Records
    /// after the terminal outcome are drained and ignored.
    ///
    /// # Errors
    /// Returns the source's transport error, after the source was released.
    pub async fn process_stream<F>(
        mut self,
        mut source: StreamSource,
        mut sink: F,
    ) -> SourceResult<String>
    where
        F: FnMut(NormalizedEvent),
    {
        tracing::info!(source = %source.label(), "stream started");
        let outcome = self.pump(&mut source, &mut sink).await;
        source.release();
        outcome?;
        if self.ignored_after_done > 0 {
            tracing::debug!(
                count = self.ignored_after_done,
                "records drained after terminal outcome"
            );
        }
        tracing::info!(text_len = self.acc.text.len(), "stream finished");
        Ok(self.into_text())
    }

    async fn pump<F>(&mut self, source: &mut StreamSource, sink: &mut F) -> SourceResult<()>
    where
        F: FnMut(NormalizedEvent),
    {
        while let Some(record) = source.next().await {
            match record {
                Ok(event) => self.step(event, sink),
                Err(err) if self.is_done() => {
                    tracing::debug!(error = %err, "source failed while draining; stopping");
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(error = %err, kind = %err.kind, "source failed");
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Exposes the translation as a pull stream of normalized events.
    ///
    /// The stream ends after the terminal outcome (or end-of-stream) and
    /// yields a transport error at most once, as its last item.
    pub fn into_events(self, source: StreamSource) -> NormalizedStream {
        let pump = EventPump {
            translator: self,
            source,
            pending: VecDeque::new(),
            exhausted: false,
        };
        stream::unfold(pump, |mut pump| async move {
            loop {
                if let Some(event) = pump.pending.pop_front() {
                    return Some((Ok(event), pump));
                }
                if pump.exhausted || pump.translator.is_done() {
                    pump.source.release();
                    return None;
                }
                match pump.source.next().await {
                    Some(Ok(event)) => {
                        let pending = &mut pump.pending;
                        pump.translator
                            .step(event, &mut |normalized| pending.push_back(normalized));
                    }
                    Some(Err(err)) => {
                        pump.exhausted = true;
                        pump.source.release();
                        return Some((Err(err), pump));
                    }
                    None => pump.exhausted = true,
                }
            }
        })
        .boxed()
    }
}

struct EventPump {
    translator: Translator,
    source: StreamSource,
    pending: VecDeque<NormalizedEvent>,
    exhausted: bool,
}

/// Processes `source` with default options. See [`Translator::process_stream`].
///
/// # Errors
/// Returns the source's transport error, after the source was released.
pub async fn process_stream<F>(source: StreamSource, sink: F) -> SourceResult<String>
where
    F: FnMut(NormalizedEvent),
{
    Translator::default().process_stream(source, sink).await
}

/// Extracts a display message from an upstream error record.
///
/// The `error` payload wins; a top-level `message` is used when the payload
/// carries nothing.
fn error_message(error: &Value, message: Option<String>) -> String {
    let from_payload = payload_message(error);
    if !from_payload.trim().is_empty() {
        return from_payload;
    }
    message.unwrap_or_default()
}

fn payload_message(error: &Value) -> String {
    match error {
        Value::Null => String::new(),
        Value::String(message) => message.clone(),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("error").and_then(|inner| inner.get("message")))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| {
                if map.is_empty() {
                    String::new()
                } else {
                    error.to_string()
                }
            }),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::stream;
    use weft_types::{DEFAULT_ERROR_MESSAGE, SourceRef, ToolStatus, UpstreamUsage};

    use super::*;
    use crate::source::SourceError;

    fn finish(usage: Option<UpstreamUsage>) -> UpstreamEvent {
        UpstreamEvent::Finish {
            usage,
            finish_reason: None,
        }
    }

    fn error_record(error: Value) -> UpstreamEvent {
        UpstreamEvent::Error {
            error,
            message: None,
        }
    }

    fn unrecognized(kind: &str) -> UpstreamEvent {
        UpstreamEvent::Unrecognized {
            kind: kind.to_string(),
        }
    }

    fn translate_with(
        options: TranslatorOptions,
        events: Vec<UpstreamEvent>,
    ) -> (Vec<NormalizedEvent>, Translator) {
        let mut translator = Translator::new(options);
        let mut out = Vec::new();
        for event in events {
            translator.step(event, &mut |e| out.push(e));
        }
        (out, translator)
    }

    fn translate(events: Vec<UpstreamEvent>) -> Vec<NormalizedEvent> {
        translate_with(TranslatorOptions::default(), events).0
    }

    fn text_delta(text: &str) -> NormalizedEvent {
        NormalizedEvent::TextDelta {
            text: text.to_string(),
        }
    }

    fn counting_source(events: Vec<UpstreamEvent>) -> (StreamSource, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&releases);
        let source = StreamSource::from_events("test", events).with_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (source, releases)
    }

    /// Plain text followed by finish with partial usage.
    #[tokio::test]
    async fn test_text_then_finish() {
        let (source, releases) = counting_source(vec![
            UpstreamEvent::text("Hi"),
            UpstreamEvent::text(" there"),
            finish(Some(UpstreamUsage {
                completion_tokens: Some(3),
                ..Default::default()
            })),
        ]);
        let mut events = Vec::new();

        let text = process_stream(source, |e| events.push(e)).await.unwrap();

        assert_eq!(text, "Hi there");
        assert_eq!(
            events,
            vec![
                text_delta("Hi"),
                text_delta(" there"),
                NormalizedEvent::TextComplete {
                    text: "Hi there".to_string()
                },
                NormalizedEvent::ResponseComplete {
                    text: "Hi there".to_string(),
                    reasoning: String::new(),
                    usage: Usage {
                        prompt_tokens: 0,
                        completion_tokens: 3,
                        total_tokens: 0,
                    },
                    finish_reason: None,
                },
            ]
        );
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    /// Reasoning is flushed right after the first text delta.
    #[test]
    fn test_reasoning_flushed_after_text_delta() {
        let events = translate(vec![
            UpstreamEvent::reasoning("because"),
            UpstreamEvent::text("Answer"),
        ]);

        assert_eq!(
            events,
            vec![
                NormalizedEvent::ThinkingDelta {
                    text: "because".to_string()
                },
                text_delta("Answer"),
                NormalizedEvent::ThinkingComplete {
                    text: "because".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_unrecognized_record_is_ignored() {
        let with_noise = translate(vec![
            UpstreamEvent::reasoning("r"),
            unrecognized("foo"),
            UpstreamEvent::text("a"),
            unrecognized("foo"),
            finish(None),
        ]);
        let without_noise = translate(vec![
            UpstreamEvent::reasoning("r"),
            UpstreamEvent::text("a"),
            finish(None),
        ]);

        assert_eq!(with_noise, without_noise);
    }

    #[test]
    fn test_unrecognized_record_keeps_phase() {
        let (events, translator) =
            translate_with(TranslatorOptions::default(), vec![unrecognized("foo")]);
        assert!(events.is_empty());
        assert_eq!(translator.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_error_record_is_terminal() {
        let (source, releases) = counting_source(vec![
            error_record(json!({"message": "rate limited"})),
            UpstreamEvent::text("late"),
            finish(None),
        ]);
        let mut events = Vec::new();

        let text = process_stream(source, |e| events.push(e)).await.unwrap();

        assert_eq!(
            events,
            vec![NormalizedEvent::Error {
                message: "rate limited".to_string()
            }]
        );
        assert_eq!(text, "");
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(error_message(&json!("boom"), None), "boom");
        assert_eq!(error_message(&json!({"message": "m"}), None), "m");
        assert_eq!(
            error_message(&json!({"error": {"message": "nested"}}), None),
            "nested"
        );
        assert_eq!(error_message(&json!({"code": 7}), None), r#"{"code":7}"#);
        assert_eq!(
            error_message(&json!("payload"), Some("top".to_string())),
            "payload"
        );

        let events = translate(vec![error_record(Value::Null)]);
        assert_eq!(
            events,
            vec![NormalizedEvent::Error {
                message: DEFAULT_ERROR_MESSAGE.to_string()
            }]
        );
    }

    #[test]
    fn test_top_level_error_message_is_kept() {
        let record =
            UpstreamEvent::decode(r#"{"type":"error","message":"rate limited"}"#).unwrap();

        let events = translate(vec![record]);

        assert_eq!(
            events,
            vec![NormalizedEvent::Error {
                message: "rate limited".to_string()
            }]
        );
    }

    #[test]
    fn test_text_deltas_are_verbatim() {
        let fragments = ["", "a", "  ", "ü\n", "{}"];
        let events = translate(
            fragments
                .iter()
                .map(|f| UpstreamEvent::text(*f))
                .collect(),
        );

        let deltas: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                NormalizedEvent::TextDelta { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(deltas, fragments);
    }

    #[test]
    fn test_one_thinking_complete_per_reasoning_run() {
        let events = translate(vec![
            UpstreamEvent::reasoning("a"),
            UpstreamEvent::reasoning("b"),
            UpstreamEvent::text("x"),
            UpstreamEvent::text("y"),
            UpstreamEvent::reasoning("c"),
            UpstreamEvent::text("z"),
        ]);

        let completes: Vec<&NormalizedEvent> = events
            .iter()
            .filter(|e| matches!(e, NormalizedEvent::ThinkingComplete { .. }))
            .collect();
        assert_eq!(
            completes,
            vec![
                &NormalizedEvent::ThinkingComplete {
                    text: "ab".to_string()
                },
                &NormalizedEvent::ThinkingComplete {
                    text: "c".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_phase_transitions() {
        let mut translator = Translator::default();
        let mut sink = |_: NormalizedEvent| {};
        assert_eq!(translator.phase(), Phase::Idle);

        translator.step(UpstreamEvent::reasoning("r"), &mut sink);
        assert_eq!(translator.phase(), Phase::Reasoning);

        translator.step(UpstreamEvent::text("t"), &mut sink);
        assert_eq!(translator.phase(), Phase::Answering);
        assert_eq!(translator.pending_reasoning(), "");

        translator.step(finish(None), &mut sink);
        assert_eq!(translator.phase(), Phase::Done);
    }

    #[test]
    fn test_signature_and_redacted_reasoning() {
        let (events, translator) = translate_with(
            TranslatorOptions::default(),
            vec![
                UpstreamEvent::RedactedReasoning {
                    data: "opaque".to_string(),
                },
                UpstreamEvent::ReasoningSignature {
                    signature: "sig".to_string(),
                },
            ],
        );

        assert_eq!(
            events,
            vec![
                NormalizedEvent::ThinkingDelta {
                    text: "opaque".to_string()
                },
                NormalizedEvent::ThinkingComplete {
                    text: "sig".to_string()
                },
            ]
        );
        assert_eq!(translator.phase(), Phase::Reasoning);
        assert_eq!(translator.pending_reasoning(), "");
    }

    #[test]
    fn test_tool_call_lifecycle() {
        let events = translate(vec![
            UpstreamEvent::ToolCallStart {
                tool_call_id: "c1".to_string(),
                tool_name: "search".to_string(),
            },
            UpstreamEvent::ToolCallDelta {
                tool_call_id: "c1".to_string(),
                tool_name: "search".to_string(),
                args_text_delta: r#"{"q":"ru"#.to_string(),
            },
            UpstreamEvent::ToolCallComplete {
                tool_call_id: "c1".to_string(),
                tool_name: "search".to_string(),
                args: json!({"q": "rust"}),
            },
            UpstreamEvent::ToolResult {
                tool_call_id: "c1".to_string(),
                tool_name: "search".to_string(),
                args: json!({"q": "rust"}),
                result: json!(["a", "b"]),
            },
        ]);

        assert_eq!(
            events,
            vec![
                NormalizedEvent::ToolCreated {
                    tool: ToolDescriptor::invoking("c1", "search"),
                    arguments: json!({}),
                },
                NormalizedEvent::ToolInProgress {
                    tool: ToolDescriptor::invoking("c1", "search"),
                    arguments_delta: r#"{"q":"ru"#.to_string(),
                },
                NormalizedEvent::ToolCreated {
                    tool: ToolDescriptor::invoking("c1", "search"),
                    arguments: json!({"q": "rust"}),
                },
                NormalizedEvent::ToolComplete {
                    tool: ToolDescriptor::done("c1", "search"),
                    arguments: json!({"q": "rust"}),
                    result: json!(["a", "b"]),
                },
            ]
        );
        let NormalizedEvent::ToolComplete { tool, .. } = &events[3] else {
            unreachable!();
        };
        assert_eq!(tool.status, ToolStatus::Done);
    }

    #[test]
    fn test_step_finish_snapshots_buffers() {
        let events = translate(vec![
            UpstreamEvent::text("part"),
            UpstreamEvent::reasoning("thinking"),
            UpstreamEvent::StepFinish {
                usage: Some(UpstreamUsage {
                    prompt_tokens: Some(10),
                    completion_tokens: Some(2),
                    total_tokens: Some(12),
                }),
                finish_reason: Some("tool-calls".to_string()),
                is_continued: false,
            },
        ]);

        assert_eq!(
            events.last(),
            Some(&NormalizedEvent::BlockComplete {
                text: "part".to_string(),
                reasoning: "thinking".to_string(),
                usage: Usage {
                    prompt_tokens: 10,
                    completion_tokens: 2,
                    total_tokens: 12,
                },
            })
        );
    }

    #[test]
    fn test_finish_with_empty_text_still_completes() {
        let events = translate(vec![finish(None)]);

        assert_eq!(
            events,
            vec![
                NormalizedEvent::TextComplete {
                    text: String::new()
                },
                NormalizedEvent::ResponseComplete {
                    text: String::new(),
                    reasoning: String::new(),
                    usage: Usage::default(),
                    finish_reason: None,
                },
            ]
        );
    }

    #[test]
    fn test_source_and_file_records() {
        let events = translate(vec![
            UpstreamEvent::Source {
                source: SourceRef {
                    id: "s1".to_string(),
                    title: Some("Docs".to_string()),
                    url: "https://example.com".to_string(),
                },
            },
            UpstreamEvent::File {
                base64: "aGk=".to_string(),
                mime_type: None,
            },
        ]);

        assert_eq!(
            events,
            vec![
                NormalizedEvent::KnowledgeComplete {
                    id: "s1".to_string(),
                    title: Some("Docs".to_string()),
                    url: "https://example.com".to_string(),
                },
                NormalizedEvent::ImageComplete {
                    image: ImageContent {
                        mime_type: DEFAULT_FILE_MIME_TYPE.to_string(),
                        data: "aGk=".to_string(),
                    },
                },
            ]
        );
    }

    #[test]
    fn test_terminal_flushes_pending_reasoning() {
        let events = translate(vec![UpstreamEvent::reasoning("unfinished"), finish(None)]);

        assert_eq!(
            events,
            vec![
                NormalizedEvent::ThinkingDelta {
                    text: "unfinished".to_string()
                },
                NormalizedEvent::ThinkingComplete {
                    text: "unfinished".to_string()
                },
                NormalizedEvent::TextComplete {
                    text: String::new()
                },
                NormalizedEvent::ResponseComplete {
                    text: String::new(),
                    reasoning: "unfinished".to_string(),
                    usage: Usage::default(),
                    finish_reason: None,
                },
            ]
        );

        let on_error = translate(vec![
            UpstreamEvent::reasoning("why"),
            error_record(json!("boom")),
        ]);
        assert_eq!(
            &on_error[1..],
            &[
                NormalizedEvent::ThinkingComplete {
                    text: "why".to_string()
                },
                NormalizedEvent::Error {
                    message: "boom".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_terminal_flush_can_be_disabled() {
        let options = TranslatorOptions {
            flush_reasoning_on_terminal: false,
        };
        let (events, _) = translate_with(
            options,
            vec![UpstreamEvent::reasoning("unfinished"), finish(None)],
        );

        assert!(
            !events
                .iter()
                .any(|e| matches!(e, NormalizedEvent::ThinkingComplete { .. }))
        );
        assert!(matches!(
            events.last(),
            Some(NormalizedEvent::ResponseComplete { reasoning, .. }) if reasoning == "unfinished"
        ));
    }

    #[test]
    fn test_identical_input_is_deterministic() {
        let input = vec![
            UpstreamEvent::reasoning("r1"),
            UpstreamEvent::text("a"),
            unrecognized("noise"),
            UpstreamEvent::ToolCallStart {
                tool_call_id: "c".to_string(),
                tool_name: "t".to_string(),
            },
            UpstreamEvent::text("b"),
            finish(None),
        ];

        let first = serde_json::to_vec(&translate(input.clone())).unwrap();
        let second = serde_json::to_vec(&translate(input)).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_transport_error_propagates_after_release() {
        let releases = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&releases);
        let records = vec![
            Ok(UpstreamEvent::text("partial")),
            Err(SourceError::io("connection reset")),
            Ok(UpstreamEvent::text("never")),
        ];
        let source = StreamSource::new("failing", stream::iter(records).boxed()).with_release(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        let mut events = Vec::new();

        let err = process_stream(source, |e| events.push(e))
            .await
            .unwrap_err();

        assert_eq!(err.message, "connection reset");
        assert_eq!(events, vec![text_delta("partial")]);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_stream_is_released_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&releases);
        let endless = stream::iter(vec![Ok(UpstreamEvent::text("tick"))])
            .chain(stream::pending())
            .boxed();
        let source = StreamSource::new("endless", endless).with_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            process_stream(source, |_| {}),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_after_done_is_drained() {
        let records = vec![
            Ok(finish(None)),
            Err(SourceError::io("late failure")),
        ];
        let source = StreamSource::new("late", stream::iter(records).boxed());

        let text = process_stream(source, |_| {}).await.unwrap();

        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_pull_stream_matches_sink_output() {
        let input = vec![
            UpstreamEvent::reasoning("because"),
            UpstreamEvent::text("Answer"),
            finish(None),
            UpstreamEvent::text("ignored"),
        ];
        let mut pushed = Vec::new();
        process_stream(StreamSource::from_events("push", input.clone()), |e| {
            pushed.push(e);
        })
        .await
        .unwrap();

        let (source, releases) = counting_source(input);
        let pulled: Vec<NormalizedEvent> = Translator::default()
            .into_events(source)
            .map(Result::unwrap)
            .collect()
            .await;

        assert_eq!(pulled, pushed);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pull_stream_ends_with_transport_error() {
        let records = vec![
            Ok(UpstreamEvent::text("a")),
            Err(SourceError::timeout("stalled")),
        ];
        let source = StreamSource::new("pull", stream::iter(records).boxed());

        let items: Vec<SourceResult<NormalizedEvent>> =
            Translator::default().into_events(source).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Ok(text_delta("a")));
        assert!(matches!(&items[1], Err(err) if err.message == "stalled"));
    }
}
