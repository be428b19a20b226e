//! CLI command handlers.

pub mod config;
pub mod providers;
pub mod translate;
