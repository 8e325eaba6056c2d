//! Core domain types shared across the pipeline

use serde::{Deserialize, Serialize};

/// The three supported diagram shapes
///
/// Closed set; adding a variant requires a prompt, a sanitizer check, and
/// a classifier rule, so this stays an enum rather than a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramType {
    /// Central topic with radiating branches
    #[default]
    RadialMindmap,
    /// Ordered steps of a process
    Flowchart,
    /// Side-by-side comparison of two or more subjects
    SequenceComparison,
}

impl DiagramType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RadialMindmap => "radial_mindmap",
            Self::Flowchart => "flowchart",
            Self::SequenceComparison => "sequence_comparison",
        }
    }

    /// The Mermaid start keyword for this shape
    pub fn source_keyword(&self) -> &'static str {
        match self {
            Self::RadialMindmap => "mindmap",
            Self::Flowchart => "flowchart",
            Self::SequenceComparison => "sequenceDiagram",
        }
    }

    /// Recognize a diagram type in a free-form answer
    ///
    /// Tolerates verbose classifier output ("I'd say FLOWCHART here").
    /// Comparison markers are checked first because "sequence comparison"
    /// also contains "sequence".
    pub fn from_keyword(answer: &str) -> Option<Self> {
        let lower = answer.to_lowercase();
        if lower.contains("sequence") || lower.contains("compar") {
            return Some(Self::SequenceComparison);
        }
        if lower.contains("flow") || lower.contains("graph") {
            return Some(Self::Flowchart);
        }
        if lower.contains("mind") || lower.contains("radial") {
            return Some(Self::RadialMindmap);
        }
        None
    }
}

impl std::fmt::Display for DiagramType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-fact enrichment metadata
///
/// Only meaningful when positionally aligned with the fact list; the
/// parser drops the whole vector on any count mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FactMetadata {
    pub theme: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

/// The complete artifact set for one generation request
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenerationResult {
    pub diagram_type: DiagramType,
    /// Plain prose explanation for a general audience
    pub universal_content: String,
    /// `Topic:` line followed by `-` bullet facts
    pub structured_content: String,
    /// Sanitized Mermaid source, never empty in a successful result
    pub diagram_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_meta: Option<Vec<FactMetadata>>,
}

impl GenerationResult {
    /// Number of bullet facts in the structured content
    pub fn fact_count(&self) -> usize {
        self.structured_content
            .lines()
            .filter(|l| l.trim_start().starts_with("- "))
            .count()
    }
}
