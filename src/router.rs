//! Model routing for generation calls
//!
//! Pure selection logic: given the query text and the kind of operation,
//! pick a model identifier, wire protocol, token budget, and effort level.
//! No I/O and no failure mode - degenerate input always falls back to the
//! configured fast model.

use crate::config::Config;
use serde::{Deserialize, Serialize};

/// Wire protocol used to talk to the provider
///
/// The two protocols differ in field names, in how text is nested in the
/// response, and in whether temperature or reasoning effort is the
/// creativity knob. Protocol-specific field names never leak past the
/// executor boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Instructions + single-turn input list, bounded by `max_output_tokens`,
    /// creativity controlled by a reasoning-effort enum
    Responses,
    /// System+user message pair bounded by `max_tokens`, creativity
    /// controlled by temperature
    Chat,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Responses => "responses",
            Self::Chat => "chat",
        }
    }
}

/// Reasoning effort level for the responses protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// One step down, saturating at `Low`
    ///
    /// Used by the executor's truncation retry, which trades reasoning
    /// depth for output budget.
    pub fn lowered(&self) -> Self {
        match self {
            Self::High => Self::Medium,
            Self::Medium | Self::Low => Self::Low,
        }
    }
}

/// Kind of generation operation being routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Single-word diagram type selection
    Classification,
    /// Structured per-type content generation
    Content,
    /// Diagram source generation
    Diagram,
    /// Single-call strategy producing all artifacts together
    Unified,
}

impl Operation {
    /// Stage name used in error reporting and logging
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::Content => "content",
            Self::Diagram => "diagram",
            Self::Unified => "unified",
        }
    }

    /// Output-token budget for this operation
    fn max_output_tokens(&self) -> u32 {
        match self {
            Self::Classification => 16,
            Self::Content => 1200,
            Self::Diagram => 1800,
            Self::Unified => 2400,
        }
    }
}

/// A fully resolved model selection for one provider call
///
/// Stateless and recomputed per call; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub model_id: String,
    pub protocol: Protocol,
    pub max_output_tokens: u32,
    pub effort: Effort,
}

/// Pure model router
///
/// Tiering policy: queries under the short-length threshold always get the
/// fast model regardless of operation, classification always gets the fast
/// model, and longer content/diagram/unified work gets the deep model.
/// This bounds latency on the common case while preserving quality on
/// complex ones.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    fast_id: String,
    fast_protocol: Protocol,
    deep_id: String,
    deep_protocol: Protocol,
    short_query_threshold: usize,
}

impl ModelRouter {
    pub fn new(config: &Config) -> Self {
        Self {
            fast_id: config.models().fast().id().to_string(),
            fast_protocol: config.models().fast().protocol(),
            deep_id: config.models().deep().id().to_string(),
            deep_protocol: config.models().deep().protocol(),
            short_query_threshold: config.pipeline().short_query_threshold(),
        }
    }

    /// Select a model and protocol for one generation call
    ///
    /// Always returns a valid choice; empty queries degrade to the fast
    /// model rather than erroring.
    pub fn select(&self, query: &str, operation: Operation) -> ModelChoice {
        let query_len = query.trim().chars().count();
        let use_fast = matches!(operation, Operation::Classification)
            || query_len < self.short_query_threshold;

        let (model_id, protocol) = if use_fast {
            (self.fast_id.clone(), self.fast_protocol)
        } else {
            (self.deep_id.clone(), self.deep_protocol)
        };

        let effort = match operation {
            Operation::Classification => Effort::Low,
            Operation::Content | Operation::Diagram => Effort::Medium,
            Operation::Unified => {
                if use_fast {
                    Effort::Medium
                } else {
                    Effort::High
                }
            }
        };

        ModelChoice {
            model_id,
            protocol,
            max_output_tokens: operation.max_output_tokens(),
            effort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_router() -> ModelRouter {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 3000

[provider]
base_url = "http://localhost:9999/v1"
api_key_env = "TEST_API_KEY"

[models.fast]
id = "test-fast"
protocol = "chat"

[models.deep]
id = "test-deep"
protocol = "responses"

[pipeline]
short_query_threshold = 48
"#;
        let config: Config = toml::from_str(toml).expect("should parse config");
        ModelRouter::new(&config)
    }

    #[test]
    fn classification_always_gets_fast_model() {
        let router = test_router();
        let long_query = "explain ".repeat(50);
        let choice = router.select(&long_query, Operation::Classification);
        assert_eq!(choice.model_id, "test-fast");
        assert_eq!(choice.protocol, Protocol::Chat);
        assert_eq!(choice.effort, Effort::Low);
        assert_eq!(choice.max_output_tokens, 16);
    }

    #[test]
    fn short_query_gets_fast_model_for_any_operation() {
        let router = test_router();
        for op in [Operation::Content, Operation::Diagram, Operation::Unified] {
            let choice = router.select("the Roman Empire", op);
            assert_eq!(choice.model_id, "test-fast", "operation {:?}", op);
        }
    }

    #[test]
    fn long_content_query_gets_deep_model() {
        let router = test_router();
        let query = "compare the economic policies of the early and late Roman Empire \
                     with attention to coinage debasement";
        let choice = router.select(query, Operation::Content);
        assert_eq!(choice.model_id, "test-deep");
        assert_eq!(choice.protocol, Protocol::Responses);
        assert_eq!(choice.effort, Effort::Medium);
    }

    #[test]
    fn long_unified_query_gets_high_effort() {
        let router = test_router();
        let query = "a".repeat(100);
        let choice = router.select(&query, Operation::Unified);
        assert_eq!(choice.effort, Effort::High);
        assert_eq!(choice.max_output_tokens, 2400);
    }

    #[test]
    fn empty_query_degrades_to_fast_model() {
        let router = test_router();
        let choice = router.select("", Operation::Unified);
        assert_eq!(choice.model_id, "test-fast");
    }

    #[test]
    fn boundary_at_short_query_threshold() {
        let router = test_router();
        // 47 chars -> fast, 48 chars -> deep
        let choice = router.select(&"a".repeat(47), Operation::Content);
        assert_eq!(choice.model_id, "test-fast");
        let choice = router.select(&"a".repeat(48), Operation::Content);
        assert_eq!(choice.model_id, "test-deep");
    }

    #[test]
    fn effort_lowered_saturates() {
        assert_eq!(Effort::High.lowered(), Effort::Medium);
        assert_eq!(Effort::Medium.lowered(), Effort::Low);
        assert_eq!(Effort::Low.lowered(), Effort::Low);
    }

    #[test]
    fn protocol_serde() {
        assert_eq!(
            serde_json::from_str::<Protocol>(r#""responses""#).unwrap(),
            Protocol::Responses
        );
        assert_eq!(
            serde_json::from_str::<Protocol>(r#""chat""#).unwrap(),
            Protocol::Chat
        );
    }
}
