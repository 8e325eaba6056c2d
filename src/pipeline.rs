//! Generation pipeline orchestrator
//!
//! Top-level state machine for one request: always attempt the
//! single-call unified strategy first; any failure during that attempt -
//! network, timeout, or parse - causes a full, unconditional fallback to
//! the sequential strategy (classify, content, universal prose, diagram
//! source, as up to four separate calls). The fallback is total: there is
//! no partial retry of a failed unified step, and exactly one fallback
//! tier exists.
//!
//! The orchestrator is intentionally sequential within a request because
//! later steps' prompts depend on earlier steps' outputs. Concurrent
//! requests share nothing except the content cache.

use crate::cache::ContentCache;
use crate::classify::Classifier;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::{Metrics, StrategyLabel};
use crate::parse::{self, ExpectedShape};
use crate::prompts;
use crate::provider::LlmExecutor;
use crate::router::{ModelRouter, Operation};
use crate::sanitize::sanitize;
use crate::types::{DiagramType, GenerationResult};
use std::sync::Arc;
use std::time::Instant;

/// Orchestrates one generation request end to end
pub struct Pipeline {
    router: ModelRouter,
    executor: Arc<dyn LlmExecutor>,
    classifier: Classifier,
    cache: Arc<dyn ContentCache>,
    diagram_type_override: Option<DiagramType>,
    metrics: Option<Metrics>,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        executor: Arc<dyn LlmExecutor>,
        cache: Arc<dyn ContentCache>,
    ) -> Self {
        let router = ModelRouter::new(config);
        let classifier = Classifier::from_strategy(
            config.pipeline().classifier(),
            router.clone(),
            executor.clone(),
        );
        Self {
            router,
            executor,
            classifier,
            cache,
            diagram_type_override: config.pipeline().diagram_type_override(),
            metrics: None,
        }
    }

    /// Attach a metrics handle
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run the full pipeline for one query
    ///
    /// # Errors
    /// - `Validation` for an empty or whitespace-only query (never retried)
    /// - otherwise, the sequential strategy's error: the unified attempt's
    ///   failure is never propagated directly
    pub async fn generate(
        &self,
        query: &str,
        type_hint: Option<DiagramType>,
    ) -> AppResult<GenerationResult> {
        if query.trim().is_empty() {
            return Err(AppError::Validation(
                "query cannot be empty or contain only whitespace".to_string(),
            ));
        }

        let hint = self.diagram_type_override.or(type_hint);

        // A known type lets us consult the cache before any provider call
        if let Some(diagram_type) = hint {
            if let Some(hit) = self.cache.get(diagram_type, query) {
                tracing::debug!(
                    diagram_type = diagram_type.as_str(),
                    "Cache hit before generation"
                );
                if let Some(m) = &self.metrics {
                    m.record_cache_hit();
                }
                return Ok(hit);
            }
            if let Some(m) = &self.metrics {
                m.record_cache_miss();
            }
        }

        let started = Instant::now();
        match self.unified(query, hint).await {
            Ok(result) => {
                if let Some(m) = &self.metrics {
                    m.record_generation(StrategyLabel::Unified, true);
                    m.observe_duration(StrategyLabel::Unified, started.elapsed().as_secs_f64());
                }
                Ok(result)
            }
            Err(unified_err) => {
                // Total fallback: the unified failure is logged and
                // discarded, and the sequential result (or its failure)
                // is what the caller sees.
                tracing::warn!(
                    error = %unified_err,
                    kind = unified_err.kind(),
                    "Unified strategy failed, falling back to sequential"
                );
                if let Some(m) = &self.metrics {
                    m.record_generation(StrategyLabel::Unified, false);
                    m.record_fallback();
                }
                let fallback_started = Instant::now();
                let result = self.sequential(query, hint).await;
                if let Some(m) = &self.metrics {
                    m.record_generation(StrategyLabel::Sequential, result.is_ok());
                    m.observe_duration(
                        StrategyLabel::Sequential,
                        fallback_started.elapsed().as_secs_f64(),
                    );
                }
                result
            }
        }
    }

    /// Single-call strategy: one round trip produces every artifact
    async fn unified(
        &self,
        query: &str,
        hint: Option<DiagramType>,
    ) -> AppResult<GenerationResult> {
        let choice = self.router.select(query, Operation::Unified);
        let raw = self
            .executor
            .execute(&choice, prompts::UNIFIED_SYSTEM, query, "unified")
            .await?;

        let parsed = parse::parse(&raw, ExpectedShape::Unified, "unified")?;
        let diagram_type = hint.or(parsed.diagram_type).unwrap_or_default();

        let diagram_source = sanitize(
            parsed
                .diagram_source
                .as_deref()
                .unwrap_or_default(),
        );
        if diagram_source.trim().is_empty() {
            return Err(AppError::MissingDiagramSource { stage: "unified" });
        }

        let universal_content = match &parsed.universal {
            Some(text) if !text.trim().is_empty() => text.clone(),
            _ => parsed.facts.join(" "),
        };

        let result = GenerationResult {
            diagram_type,
            universal_content,
            structured_content: parsed.structured_content(),
            diagram_source,
            diagram_meta: parsed.meta,
        };

        // The unified attempt's cache write is authoritative; the
        // sequential fallback consults it before regenerating.
        self.cache.put(diagram_type, query, result.clone());
        Ok(result)
    }

    /// Multi-call fallback strategy
    ///
    /// Performs the same logical work as up to four separate calls:
    /// type selection, content generation, universal prose, diagram
    /// source. Consults the cache once the type is known.
    async fn sequential(
        &self,
        query: &str,
        hint: Option<DiagramType>,
    ) -> AppResult<GenerationResult> {
        let diagram_type = match hint {
            Some(dt) => dt,
            None => self.classifier.classify(query).await,
        };
        tracing::debug!(
            diagram_type = diagram_type.as_str(),
            "Sequential strategy selected diagram type"
        );

        if let Some(hit) = self.cache.get(diagram_type, query) {
            tracing::debug!(
                diagram_type = diagram_type.as_str(),
                "Cache hit in sequential strategy"
            );
            if let Some(m) = &self.metrics {
                m.record_cache_hit();
            }
            return Ok(hit);
        }

        // Content: structured topic + facts for this diagram shape
        let choice = self.router.select(query, Operation::Content);
        let raw = self
            .executor
            .execute(&choice, prompts::content_system(diagram_type), query, "content")
            .await?;
        let parsed = parse::parse(&raw, ExpectedShape::Single(diagram_type), "content")?;
        let structured_content = parsed.structured_content();

        // Universal prose: plain explanation, consumed verbatim
        let choice = self.router.select(query, Operation::Content);
        let universal_raw = self
            .executor
            .execute(&choice, prompts::UNIVERSAL_SYSTEM, query, "universal")
            .await?;
        let universal_content = parse::repair_spacing(universal_raw.trim());

        // Diagram source: prompt depends on the structured content
        let choice = self.router.select(query, Operation::Diagram);
        let diagram_raw = self
            .executor
            .execute(
                &choice,
                prompts::diagram_system(diagram_type),
                &structured_content,
                "diagram",
            )
            .await?;
        let diagram_source = parse::extract_diagram_source(&diagram_raw)
            .ok_or(AppError::MissingDiagramSource { stage: "diagram" })?;
        let diagram_source = sanitize(&diagram_source);
        if diagram_source.trim().is_empty() {
            return Err(AppError::MissingDiagramSource { stage: "diagram" });
        }

        let result = GenerationResult {
            diagram_type,
            universal_content,
            structured_content,
            diagram_source,
            diagram_meta: parsed.meta,
        };
        self.cache.put(diagram_type, query, result.clone());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::router::ModelChoice;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Executor fake that scripts a response (or failure) per stage and
    /// records the order of stages invoked
    struct ScriptedExecutor {
        calls: Mutex<Vec<&'static str>>,
        fail_stages: Vec<&'static str>,
    }

    impl ScriptedExecutor {
        fn new(fail_stages: Vec<&'static str>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_stages,
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            _choice: &ModelChoice,
            _system_prompt: &str,
            _user_message: &str,
            stage: &'static str,
        ) -> AppResult<String> {
            self.calls.lock().unwrap().push(stage);
            if self.fail_stages.contains(&stage) {
                return Err(AppError::Timeout {
                    stage,
                    timeout_seconds: 45,
                });
            }
            Ok(match stage {
                "unified" => r#"{
                    "diagram_type": "flowchart",
                    "topic": "Unified topic",
                    "universal": "Unified prose.",
                    "facts": [{"text": "unified fact", "theme": "t"}],
                    "diagram": "flowchart TD\n    A --> B"
                }"#
                .to_string(),
                "classification" => "FLOWCHART".to_string(),
                "content" => r#"{
                    "topic": "Sequential topic",
                    "facts": [{"text": "step one", "theme": "t"}, {"text": "step two", "theme": "t"}]
                }"#
                .to_string(),
                "universal" => "Sequential prose.".to_string(),
                "diagram" => "flowchart TD\n    S1 --> S2".to_string(),
                other => panic!("unexpected stage {}", other),
            })
        }
    }

    fn test_config() -> Config {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 3000

[provider]
base_url = "http://localhost:9999/v1"
api_key_env = "TEST_API_KEY"

[models.fast]
id = "mini"
protocol = "chat"

[models.deep]
id = "large"
protocol = "responses"
"#;
        toml::from_str(toml).expect("should parse config")
    }

    fn pipeline_with(executor: Arc<ScriptedExecutor>) -> Pipeline {
        Pipeline::new(
            &test_config(),
            executor,
            Arc::new(TtlCache::new(Duration::from_secs(120))),
        )
    }

    #[tokio::test]
    async fn unified_success_makes_exactly_one_call() {
        let executor = Arc::new(ScriptedExecutor::new(vec![]));
        let pipeline = pipeline_with(executor.clone());

        let result = pipeline.generate("the Roman Empire", None).await.unwrap();
        assert_eq!(result.diagram_type, DiagramType::Flowchart);
        assert!(result.structured_content.starts_with("Topic: Unified topic"));
        assert_eq!(executor.calls(), vec!["unified"]);
    }

    #[tokio::test]
    async fn unified_failure_triggers_full_sequential_fallback() {
        let executor = Arc::new(ScriptedExecutor::new(vec!["unified"]));
        let pipeline = pipeline_with(executor.clone());

        let result = pipeline.generate("the Roman Empire", None).await.unwrap();
        assert_eq!(result.universal_content, "Sequential prose.");
        // Heuristic classifier is the default, so no classification call;
        // the sequential strategy runs exactly once
        assert_eq!(
            executor.calls(),
            vec!["unified", "content", "universal", "diagram"]
        );
    }

    #[tokio::test]
    async fn sequential_failure_is_surfaced_not_the_unified_one() {
        let executor = Arc::new(ScriptedExecutor::new(vec!["unified", "diagram"]));
        let pipeline = pipeline_with(executor.clone());

        let err = pipeline.generate("the Roman Empire", None).await.unwrap_err();
        assert_eq!(err.kind(), "timeout");
        assert!(err.to_string().contains("diagram"));
    }

    #[tokio::test]
    async fn empty_query_is_validation_error_with_no_calls() {
        let executor = Arc::new(ScriptedExecutor::new(vec![]));
        let pipeline = pipeline_with(executor.clone());

        let err = pipeline.generate("   ", None).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn type_hint_consults_cache_before_any_call() {
        let executor = Arc::new(ScriptedExecutor::new(vec![]));
        let cache = Arc::new(TtlCache::new(Duration::from_secs(120)));
        let pipeline = Pipeline::new(&test_config(), executor.clone(), cache.clone());

        let seeded = GenerationResult {
            diagram_type: DiagramType::Flowchart,
            universal_content: "cached".to_string(),
            structured_content: "Topic: cached".to_string(),
            diagram_source: "flowchart TD\n    A --> B".to_string(),
            diagram_meta: None,
        };
        cache.put(DiagramType::Flowchart, "reset a router", seeded.clone());

        let result = pipeline
            .generate("reset a router", Some(DiagramType::Flowchart))
            .await
            .unwrap();
        assert_eq!(result, seeded);
        assert!(executor.calls().is_empty(), "cache hit must skip the provider");
    }

    #[tokio::test]
    async fn sequential_consults_cache_written_by_prior_unified_attempt() {
        // First request populates the cache via the unified strategy;
        // a second request whose unified attempt fails must be served
        // from the cache without regenerating.
        let executor = Arc::new(ScriptedExecutor::new(vec![]));
        let cache = Arc::new(TtlCache::new(Duration::from_secs(120)));
        let pipeline = Pipeline::new(&test_config(), executor.clone(), cache.clone());
        pipeline.generate("how do I reset a router", None).await.unwrap();
        assert_eq!(executor.calls(), vec!["unified"]);

        let failing = Arc::new(ScriptedExecutor::new(vec!["unified"]));
        let pipeline = Pipeline::new(&test_config(), failing.clone(), cache);
        let result = pipeline.generate("how do I reset a router", None).await.unwrap();
        assert!(result.structured_content.starts_with("Topic: Unified topic"));
        assert_eq!(
            failing.calls(),
            vec!["unified"],
            "sequential must hit the cache instead of regenerating"
        );
    }

    #[tokio::test]
    async fn unified_result_diagram_source_is_sanitized() {
        struct MessyUnified;

        #[async_trait]
        impl LlmExecutor for MessyUnified {
            async fn execute(
                &self,
                _choice: &ModelChoice,
                _system_prompt: &str,
                _user_message: &str,
                _stage: &'static str,
            ) -> AppResult<String> {
                Ok(r#"{
                    "diagram_type": "flowchart",
                    "topic": "T",
                    "universal": "P.",
                    "facts": [{"text": "a fact", "theme": "t"}],
                    "diagram": "```mermaid\nflowchartTD\nA[\"Say \"hi\"\"] --> B\n```"
                }"#
                .to_string())
            }
        }

        let pipeline = Pipeline::new(
            &test_config(),
            Arc::new(MessyUnified),
            Arc::new(TtlCache::new(Duration::from_secs(120))),
        );
        let result = pipeline.generate("greeting flow", None).await.unwrap();
        assert!(result.diagram_source.starts_with("flowchart TD"));
        assert!(result.diagram_source.contains(r#"A["Say 'hi'"]"#));
        assert!(!result.diagram_source.contains("```"));
    }
}
