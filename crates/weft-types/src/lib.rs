//! Shared event types for weft (upstream records and normalized events).

pub mod normalized;
pub mod upstream;

pub use normalized::{
    DEFAULT_ERROR_MESSAGE, ImageContent, NormalizedEvent, ToolDescriptor, ToolStatus, Usage,
};
pub use upstream::{DecodeError, SourceRef, UpstreamEvent, UpstreamUsage};
