//! Command-line interface for Sketchmind
//!
//! Provides argument parsing and subcommand handling for the Sketchmind
//! binary.

use clap::{Parser, Subcommand};

/// LLM-backed diagram generation service
#[derive(Parser)]
#[command(name = "sketchmind")]
#[command(version)]
#[command(about = "Turns free-text queries into sanitized Mermaid diagrams")]
#[command(
    long_about = "Sketchmind orchestrates LLM calls to turn a free-text query into a \
    classified, structured, sanitized Mermaid diagram, with a single-call unified \
    strategy and a sequential per-stage fallback."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# Sketchmind Configuration
# ========================
#
# This file configures the HTTP server, the upstream LLM provider, the
# model tiers, pipeline tuning, and observability.

[server]
# IP address to bind to (0.0.0.0 for all interfaces)
host = "0.0.0.0"

# Port to listen on
port = 3000

[provider]
# Base URL of an OpenAI-compatible API (no trailing slash)
base_url = "https://api.openai.com/v1"

# Name of the environment variable holding the bearer credential.
# The credential itself never lives in this file.
api_key_env = "SKETCHMIND_API_KEY"

# Per-call timeout in seconds (connect + full body read)
request_timeout_seconds = 45

# Model tiers. The fast tier handles classification and short queries;
# the deep tier handles content, diagram, and unified generation.
#
# protocol selects the wire shape per model:
#   - "responses": the Responses API (instructions + input, reasoning effort)
#   - "chat": classic chat completions (system + user messages)

[models.fast]
id = "gpt-5-mini"
protocol = "chat"

[models.deep]
id = "gpt-5.2"
protocol = "responses"

[pipeline]
# Classifier implementation:
#   - "heuristic": zero-latency keyword matching (default)
#   - "llm": one extra fast-tier call per unclassified query
classifier = "heuristic"

# How long generated results stay cached, in seconds
cache_ttl_seconds = 120

# Queries shorter than this many characters route to the fast tier
short_query_threshold = 48

# Force every generation to one diagram type, skipping classification.
# Uncomment to pin:
# diagram_type_override = "radial_mindmap"

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
log_level = "info"

# Prometheus metrics are always available at /metrics on the server port
"#
}
