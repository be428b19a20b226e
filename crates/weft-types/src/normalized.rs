//! Normalized events delivered to a rendering consumer.
//!
//! This module defines the contract between the translator and whatever
//! renders its output. Events are serializable so they can be written as
//! JSON lines.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::upstream::UpstreamUsage;

/// Message used for error events whose upstream payload carried nothing.
pub const DEFAULT_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Events emitted by the translator, in stream order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NormalizedEvent {
    /// Incremental answer text.
    TextDelta { text: String },

    /// Incremental reasoning text (also carries redacted reasoning payloads).
    ThinkingDelta { text: String },

    /// Closes a reasoning run with its full text, or carries a signature.
    ThinkingComplete { text: String },

    /// A tool call was announced (arguments may still be empty).
    ToolCreated { tool: ToolDescriptor, arguments: Value },

    /// Partial tool arguments while the call is streaming.
    ToolInProgress {
        tool: ToolDescriptor,
        arguments_delta: String,
    },

    /// A tool call finished with a result.
    ToolComplete {
        tool: ToolDescriptor,
        arguments: Value,
        result: Value,
    },

    /// One generation step ended; snapshots of the buffers at that point.
    BlockComplete {
        text: String,
        reasoning: String,
        usage: Usage,
    },

    /// Full answer text, emitted once at the end of the response.
    TextComplete { text: String },

    /// Response finished.
    ResponseComplete {
        text: String,
        reasoning: String,
        usage: Usage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },

    /// A cited source.
    KnowledgeComplete {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        url: String,
    },

    /// A generated image.
    ImageComplete { image: ImageContent },

    /// An error reported by the upstream.
    Error { message: String },
}

impl NormalizedEvent {
    /// Returns the snake_case discriminant used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            NormalizedEvent::TextDelta { .. } => "text_delta",
            NormalizedEvent::ThinkingDelta { .. } => "thinking_delta",
            NormalizedEvent::ThinkingComplete { .. } => "thinking_complete",
            NormalizedEvent::ToolCreated { .. } => "tool_created",
            NormalizedEvent::ToolInProgress { .. } => "tool_in_progress",
            NormalizedEvent::ToolComplete { .. } => "tool_complete",
            NormalizedEvent::BlockComplete { .. } => "block_complete",
            NormalizedEvent::TextComplete { .. } => "text_complete",
            NormalizedEvent::ResponseComplete { .. } => "response_complete",
            NormalizedEvent::KnowledgeComplete { .. } => "knowledge_complete",
            NormalizedEvent::ImageComplete { .. } => "image_complete",
            NormalizedEvent::Error { .. } => "error",
        }
    }

    /// Returns true for the events that end a response.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NormalizedEvent::ResponseComplete { .. } | NormalizedEvent::Error { .. }
        )
    }

    /// Creates an error event, falling back to a generic message when blank.
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            DEFAULT_ERROR_MESSAGE.to_string()
        } else {
            message
        };
        NormalizedEvent::Error { message }
    }
}

/// Lifecycle status of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Invoking,
    Done,
}

/// Tool descriptor attached to every tool event.
///
/// The upstream stream does not carry tool descriptions or schemas, so
/// `description` is empty and `input_schema` is a bare object schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub status: ToolStatus,
}

impl ToolDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: ToolStatus) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            input_schema: json!({ "type": "object" }),
            status,
        }
    }

    pub fn invoking(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ToolStatus::Invoking)
    }

    pub fn done(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ToolStatus::Done)
    }
}

/// Normalized token usage. Missing upstream fields are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl From<Option<&UpstreamUsage>> for Usage {
    fn from(usage: Option<&UpstreamUsage>) -> Self {
        let Some(usage) = usage else {
            return Usage::default();
        };
        Usage {
            prompt_tokens: usage.prompt_tokens.unwrap_or(0),
            completion_tokens: usage.completion_tokens.unwrap_or(0),
            total_tokens: usage.total_tokens.unwrap_or(0),
        }
    }
}

/// Base64-encoded image with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageContent {
    /// MIME type (e.g., "image/png")
    pub mime_type: String,
    /// Base64-encoded image data
    pub data: String,
}
