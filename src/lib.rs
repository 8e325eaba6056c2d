//! Sketchmind - LLM-backed diagram generation service
//!
//! Turns a free-text query into a classified, structured, sanitized
//! Mermaid diagram. A single unified LLM call is attempted first; any
//! failure falls back to a sequential per-stage pipeline (classify,
//! content, universal, diagram) so one malformed response never sinks
//! the whole request.

pub mod cache;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod parse;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod router;
pub mod sanitize;
pub mod telemetry;
pub mod types;
