//! Upstream records as emitted by a model-inference stream.
//!
//! Records are JSON objects discriminated by a `type` field. Decoding is
//! lenient: anything that is an object but does not match a known kind
//! becomes [`UpstreamEvent::Unrecognized`] instead of failing the stream.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

/// Token usage as reported upstream. Every field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpstreamUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// A cited source attached to the response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceRef {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
}

/// One record from the upstream stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum UpstreamEvent {
    /// Fragment of answer text.
    TextDelta { text_delta: String },
    /// Fragment of chain-of-thought reasoning.
    #[serde(alias = "reasoning")]
    ReasoningDelta { text_delta: String },
    /// Signature closing a reasoning block.
    ReasoningSignature { signature: String },
    /// Reasoning content the provider chose to redact (opaque payload).
    RedactedReasoning { data: String },
    /// Model started streaming a tool call.
    #[serde(alias = "tool-call-streaming-start")]
    ToolCallStart {
        tool_call_id: String,
        tool_name: String,
    },
    /// Partial JSON for the arguments of a streaming tool call.
    ToolCallDelta {
        tool_call_id: String,
        tool_name: String,
        args_text_delta: String,
    },
    /// Tool call with its complete arguments.
    #[serde(alias = "tool-call")]
    ToolCallComplete {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        args: Value,
    },
    /// Result of an executed tool call.
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        args: Value,
        #[serde(default)]
        result: Value,
    },
    /// End of one generation step (a multi-step response has several).
    StepFinish {
        #[serde(default)]
        usage: Option<UpstreamUsage>,
        #[serde(default)]
        finish_reason: Option<String>,
        #[serde(default)]
        is_continued: bool,
    },
    /// End of the whole response.
    Finish {
        #[serde(default)]
        usage: Option<UpstreamUsage>,
        #[serde(default)]
        finish_reason: Option<String>,
    },
    /// Citation for retrieved knowledge.
    Source { source: SourceRef },
    /// Generated file, base64 encoded.
    File {
        base64: String,
        #[serde(default)]
        mime_type: Option<String>,
    },
    /// Error signalled in-band by the upstream.
    Error {
        #[serde(default)]
        error: Value,
        /// Message sent next to (or instead of) the `error` payload.
        #[serde(default)]
        message: Option<String>,
    },
    /// Any record this crate does not understand.
    #[serde(skip)]
    Unrecognized { kind: String },
}

/// Wire names of every kind [`UpstreamEvent`] decodes, aliases included.
const KNOWN_KINDS: &[&str] = &[
    "text-delta",
    "reasoning-delta",
    "reasoning",
    "reasoning-signature",
    "redacted-reasoning",
    "tool-call-start",
    "tool-call-streaming-start",
    "tool-call-delta",
    "tool-call-complete",
    "tool-call",
    "tool-result",
    "step-finish",
    "finish",
    "source",
    "file",
    "error",
];

impl UpstreamEvent {
    /// Decodes a record from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the payload is not valid JSON or not a JSON object.
    pub fn decode(data: &str) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(data).map_err(|err| DecodeError::InvalidJson(err.to_string()))?;
        Self::from_value(value)
    }

    /// Decodes a record from an already parsed JSON value.
    ///
    /// Objects with an unknown `type`, a missing `type`, or a payload that does
    /// not fit their kind decode to `Unrecognized`.
    ///
    /// # Errors
    /// Returns an error if the value is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        if !value.is_object() {
            return Err(DecodeError::NotAnObject);
        }
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if !Self::is_known_kind(&kind) {
            return Ok(Self::Unrecognized { kind });
        }
        Ok(serde_json::from_value(value).unwrap_or(Self::Unrecognized { kind }))
    }

    /// Returns true if `kind` names a record kind this crate decodes.
    pub fn is_known_kind(kind: &str) -> bool {
        KNOWN_KINDS.contains(&kind)
    }

    /// Returns the canonical wire name of this record's kind.
    pub fn kind(&self) -> &str {
        match self {
            Self::TextDelta { .. } => "text-delta",
            Self::ReasoningDelta { .. } => "reasoning-delta",
            Self::ReasoningSignature { .. } => "reasoning-signature",
            Self::RedactedReasoning { .. } => "redacted-reasoning",
            Self::ToolCallStart { .. } => "tool-call-start",
            Self::ToolCallDelta { .. } => "tool-call-delta",
            Self::ToolCallComplete { .. } => "tool-call-complete",
            Self::ToolResult { .. } => "tool-result",
            Self::StepFinish { .. } => "step-finish",
            Self::Finish { .. } => "finish",
            Self::Source { .. } => "source",
            Self::File { .. } => "file",
            Self::Error { .. } => "error",
            Self::Unrecognized { kind } => kind.as_str(),
        }
    }

    /// Creates a text delta record.
    pub fn text(fragment: impl Into<String>) -> Self {
        Self::TextDelta {
            text_delta: fragment.into(),
        }
    }

    /// Creates a reasoning delta record.
    pub fn reasoning(fragment: impl Into<String>) -> Self {
        Self::ReasoningDelta {
            text_delta: fragment.into(),
        }
    }
}

/// Failure to decode a record payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not JSON.
    InvalidJson(String),
    /// Payload is JSON but not an object.
    NotAnObject,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidJson(err) => write!(f, "invalid JSON record: {err}"),
            DecodeError::NotAnObject => write!(f, "record is not a JSON object"),
        }
    }
}

impl std::error::Error for DecodeError {}
