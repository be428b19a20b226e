//! Renders normalized events to stdout/stderr.
//!
//! # Output contract
//! - `json`: one event object per line on stdout
//! - `text`: answer deltas on stdout; reasoning, tool and status lines on
//!   stderr; a final newline after the answer

use std::io::{Stderr, Stdout, Write, stderr, stdout};

use clap::ValueEnum;
use weft_types::NormalizedEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

pub struct EventRenderer {
    format: OutputFormat,
    stdout: Stdout,
    stderr: Stderr,
    /// Answer text was written without a trailing newline yet.
    needs_final_newline: bool,
    /// Reasoning text was written to stderr without a trailing newline yet.
    in_reasoning: bool,
}

impl EventRenderer {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            stdout: stdout(),
            stderr: stderr(),
            needs_final_newline: false,
            in_reasoning: false,
        }
    }

    pub fn handle_event(&mut self, event: &NormalizedEvent) {
        match self.format {
            OutputFormat::Json => self.write_json(event),
            OutputFormat::Text => self.write_text(event),
        }
    }

    fn write_json(&mut self, event: &NormalizedEvent) {
        match serde_json::to_string(event) {
            Ok(line) => {
                let _ = writeln!(self.stdout, "{line}");
                let _ = self.stdout.flush();
            }
            Err(err) => tracing::warn!(error = %err, kind = event.kind(), "failed to encode event"),
        }
    }

    fn write_text(&mut self, event: &NormalizedEvent) {
        match event {
            NormalizedEvent::TextDelta { text } => {
                if !text.is_empty() {
                    let _ = write!(self.stdout, "{text}");
                    let _ = self.stdout.flush();
                    self.needs_final_newline = true;
                }
            }
            NormalizedEvent::ThinkingDelta { text } => {
                if !self.in_reasoning {
                    let _ = write!(self.stderr, "Thinking: ");
                    self.in_reasoning = true;
                }
                let _ = write!(self.stderr, "{text}");
                let _ = self.stderr.flush();
            }
            NormalizedEvent::ThinkingComplete { .. } => self.end_reasoning(),
            NormalizedEvent::ToolCreated { tool, .. } => {
                self.end_reasoning();
                self.end_answer_line();
                let _ = writeln!(self.stderr, "Tool requested: {} ({})", tool.name, tool.id);
            }
            NormalizedEvent::ToolComplete { tool, .. } => {
                let _ = writeln!(self.stderr, "Tool finished: {} ({})", tool.name, tool.id);
            }
            NormalizedEvent::KnowledgeComplete { title, url, .. } => {
                self.end_reasoning();
                self.end_answer_line();
                match title {
                    Some(title) => {
                        let _ = writeln!(self.stderr, "Source: {title} <{url}>");
                    }
                    None => {
                        let _ = writeln!(self.stderr, "Source: {url}");
                    }
                }
            }
            NormalizedEvent::ImageComplete { image } => {
                self.end_reasoning();
                self.end_answer_line();
                let _ = writeln!(
                    self.stderr,
                    "Image: {} ({} base64 chars)",
                    image.mime_type,
                    image.data.len()
                );
            }
            NormalizedEvent::Error { message } => {
                self.end_reasoning();
                self.end_answer_line();
                let _ = writeln!(self.stderr, "Error: {message}");
            }
            NormalizedEvent::ToolInProgress { .. }
            | NormalizedEvent::BlockComplete { .. }
            | NormalizedEvent::TextComplete { .. }
            | NormalizedEvent::ResponseComplete { .. } => {}
        }
    }

    fn end_reasoning(&mut self) {
        if self.in_reasoning {
            let _ = writeln!(self.stderr);
            self.in_reasoning = false;
        }
    }

    fn end_answer_line(&mut self) {
        if self.needs_final_newline {
            let _ = writeln!(self.stdout);
            let _ = self.stdout.flush();
            self.needs_final_newline = false;
        }
    }

    /// Terminates any open lines after the stream completed.
    pub fn finish(&mut self) {
        self.end_reasoning();
        self.end_answer_line();
    }

    pub fn interrupted(&mut self) {
        self.finish();
        let _ = writeln!(self.stderr, "Interrupted.");
    }
}
