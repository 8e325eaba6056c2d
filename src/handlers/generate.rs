//! Generation endpoint handler
//!
//! Handles POST /generate: one query in, one sanitized diagram package
//! out, or a structured failure payload. Callers must treat an empty
//! `diagram_source` as failure regardless of HTTP status.

use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::middleware::RequestId;
use crate::types::{DiagramType, FactMetadata};
use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Maximum allowed query length in characters
const MAX_QUERY_LENGTH: usize = 4_000;

/// Generation request from the client
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    query: String,
    /// Optional caller-supplied diagram type, skipping classification
    #[serde(default)]
    diagram_type: Option<DiagramType>,
}

impl GenerateRequest {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn diagram_type(&self) -> Option<DiagramType> {
        self.diagram_type
    }

    fn validate(&self) -> AppResult<()> {
        if self.query.trim().is_empty() {
            return Err(AppError::Validation(
                "query cannot be empty or contain only whitespace".to_string(),
            ));
        }
        let char_count = self.query.chars().count();
        if char_count > MAX_QUERY_LENGTH {
            return Err(AppError::Validation(format!(
                "query exceeds maximum length of {} characters (got {})",
                MAX_QUERY_LENGTH, char_count
            )));
        }
        Ok(())
    }
}

/// Successful generation response
#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    success: bool,
    diagram_type: DiagramType,
    universal_content: String,
    structured_content: String,
    diagram_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagram_meta: Option<Vec<FactMetadata>>,
}

/// Handle POST /generate
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    request.validate()?;

    tracing::info!(
        request_id = %request_id,
        query_length = request.query().chars().count(),
        diagram_type_hint = ?request.diagram_type(),
        "Generation request received"
    );

    let started = Instant::now();
    let result = state
        .pipeline()
        .generate(request.query(), request.diagram_type())
        .await
        .inspect_err(|e| {
            tracing::error!(
                request_id = %request_id,
                kind = e.kind(),
                error = %e,
                "Generation failed"
            );
        })?;

    tracing::info!(
        request_id = %request_id,
        diagram_type = result.diagram_type.as_str(),
        duration_ms = started.elapsed().as_millis() as u64,
        diagram_source_len = result.diagram_source.len(),
        "Generation completed"
    );

    Ok(Json(GenerateResponse {
        success: true,
        diagram_type: result.diagram_type,
        universal_content: result.universal_content,
        structured_content: result.structured_content,
        diagram_source: result.diagram_source,
        diagram_meta: result.diagram_meta,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_fails_validation() {
        let request: GenerateRequest = serde_json::from_str(r#"{"query": "   "}"#).unwrap();
        let err = request.validate().unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn oversized_query_fails_validation() {
        let query = "a".repeat(MAX_QUERY_LENGTH + 1);
        let request: GenerateRequest =
            serde_json::from_str(&format!(r#"{{"query": "{}"}}"#, query)).unwrap();
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("maximum length"));
    }

    #[test]
    fn diagram_type_hint_is_optional() {
        let request: GenerateRequest =
            serde_json::from_str(r#"{"query": "the Roman Empire"}"#).unwrap();
        assert!(request.diagram_type().is_none());

        let request: GenerateRequest = serde_json::from_str(
            r#"{"query": "the Roman Empire", "diagram_type": "radial_mindmap"}"#,
        )
        .unwrap();
        assert_eq!(request.diagram_type(), Some(DiagramType::RadialMindmap));
    }

    #[test]
    fn response_omits_absent_metadata() {
        let response = GenerateResponse {
            success: true,
            diagram_type: DiagramType::Flowchart,
            universal_content: "p".to_string(),
            structured_content: "Topic: t".to_string(),
            diagram_source: "flowchart TD\n    A --> B".to_string(),
            diagram_meta: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("diagram_meta").is_none());
        assert_eq!(json["success"], true);
    }
}
