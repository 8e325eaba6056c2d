//! Health check endpoint handler

use axum::Json;
use serde_json::{Value, json};

/// Handle GET /health
///
/// Liveness only. Does not probe the upstream provider.
pub async fn handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "sketchmind",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
