//! Diagram type classification
//!
//! Two implementations coexist and either may be active depending on
//! deployment: a zero-latency keyword heuristic, and an LLM-based
//! single-word classification routed through the model router with a
//! tiny token budget. The heuristic path exists specifically to avoid a
//! network round trip for the common case.
//!
//! Classification never fails - any heuristic miss or remote-call failure
//! defaults to `RadialMindmap`.

use crate::config::ClassifierStrategy;
use crate::prompts;
use crate::provider::LlmExecutor;
use crate::router::{ModelRouter, Operation};
use crate::types::DiagramType;
use std::sync::Arc;

/// Comparison phrasing routes to `SequenceComparison`
const COMPARISON_MARKERS: &[&str] = &[
    " vs ",
    " vs. ",
    "versus",
    "compare",
    "comparison",
    "difference between",
    "differences between",
    "pros and cons",
    "better than",
];

/// Process/how-to phrasing routes to `Flowchart`
const PROCESS_MARKERS: &[&str] = &[
    "how do i",
    "how do you",
    "how to",
    "steps to",
    "step by step",
    "process of",
    "workflow",
    "guide to",
    "install",
    "set up",
    "configure",
    "reset",
    "deploy",
];

/// Zero-latency keyword classifier
#[derive(Debug, Clone, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a query by keyword matching
    ///
    /// Comparison markers win over process markers; anything unmatched is
    /// a radial mindmap.
    pub fn classify(&self, query: &str) -> DiagramType {
        let lower = query.to_lowercase();
        if COMPARISON_MARKERS.iter().any(|m| lower.contains(m)) {
            return DiagramType::SequenceComparison;
        }
        if PROCESS_MARKERS.iter().any(|m| lower.contains(m)) {
            return DiagramType::Flowchart;
        }
        DiagramType::RadialMindmap
    }
}

/// LLM-backed classifier: one single-word call on the fast model
pub struct LlmClassifier {
    router: ModelRouter,
    executor: Arc<dyn LlmExecutor>,
}

impl LlmClassifier {
    pub fn new(router: ModelRouter, executor: Arc<dyn LlmExecutor>) -> Self {
        Self { router, executor }
    }

    pub async fn classify(&self, query: &str) -> DiagramType {
        let choice = self.router.select(query, Operation::Classification);
        match self
            .executor
            .execute(&choice, prompts::CLASSIFY_SYSTEM, query, "classification")
            .await
        {
            Ok(answer) => match DiagramType::from_keyword(&answer) {
                Some(dt) => dt,
                None => {
                    tracing::warn!(
                        answer = %answer.chars().take(80).collect::<String>(),
                        "Classifier answer unrecognized, defaulting to radial mindmap"
                    );
                    DiagramType::RadialMindmap
                }
            },
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Classification call failed, defaulting to radial mindmap"
                );
                DiagramType::RadialMindmap
            }
        }
    }
}

/// Active classifier, selected by `pipeline.classifier` in config
pub enum Classifier {
    Heuristic(HeuristicClassifier),
    Llm(LlmClassifier),
}

impl Classifier {
    pub fn from_strategy(
        strategy: ClassifierStrategy,
        router: ModelRouter,
        executor: Arc<dyn LlmExecutor>,
    ) -> Self {
        match strategy {
            ClassifierStrategy::Heuristic => Self::Heuristic(HeuristicClassifier::new()),
            ClassifierStrategy::Llm => Self::Llm(LlmClassifier::new(router, executor)),
        }
    }

    pub async fn classify(&self, query: &str) -> DiagramType {
        match self {
            Self::Heuristic(c) => c.classify(query),
            Self::Llm(c) => c.classify(query).await,
        }
    }
}
