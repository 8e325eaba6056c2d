//! Prompt templates for generation calls
//!
//! Opaque configuration strings. The orchestration layer treats these as
//! black boxes; nothing in the pipeline depends on their wording, only on
//! the response shapes they request.

use crate::types::DiagramType;

/// Single-word diagram type selection
pub const CLASSIFY_SYSTEM: &str = "\
You select the best diagram shape for a user's query. Answer with exactly one \
word: FLOWCHART for processes, how-tos, and step-by-step instructions; \
SEQUENCE_COMPARISON for comparisons between two or more things; \
RADIAL_MINDMAP for everything else. No explanation, no punctuation.";

/// Single-call strategy: all artifacts in one JSON object
pub const UNIFIED_SYSTEM: &str = "\
You generate a complete diagram package for a user's query. Respond with a \
single JSON object and nothing else, with these fields: \
\"diagram_type\" (one of \"flowchart\", \"radial_mindmap\", \"sequence_comparison\"), \
\"topic\" (a short title), \
\"universal\" (two to four sentences of plain prose explaining the topic), \
\"facts\" (an array of objects, each with \"text\", \"theme\", \"keywords\", and \
optionally \"search_hint\" and \"entity\"), and \
\"diagram\" (valid Mermaid source matching the diagram type). \
Do not wrap the JSON in markdown fences.";

/// Free prose explanation of the topic
pub const UNIVERSAL_SYSTEM: &str = "\
Explain the user's topic in two to four plain sentences for a general \
audience. No lists, no headings, no markdown.";

/// Structured content generation, specialized per diagram shape
pub fn content_system(diagram_type: DiagramType) -> &'static str {
    match diagram_type {
        DiagramType::Flowchart => {
            "Break the user's query into an ordered sequence of steps. Respond with a \
             JSON object: \"topic\" (short title) and \"facts\" (array of objects with \
             \"text\" describing one step, \"theme\", \"keywords\", and optionally \
             \"search_hint\" and \"entity\"). Keep steps in execution order."
        }
        DiagramType::RadialMindmap => {
            "Identify the key aspects of the user's topic. Respond with a JSON object: \
             \"topic\" (short title) and \"facts\" (array of objects with \"text\" \
             describing one aspect, \"theme\", \"keywords\", and optionally \
             \"search_hint\" and \"entity\")."
        }
        DiagramType::SequenceComparison => {
            "Compare the subjects in the user's query point by point. Respond with a \
             JSON object: \"topic\" (short title) and \"facts\" (array of objects with \
             \"text\" stating one point of comparison, \"theme\", \"keywords\", and \
             optionally \"search_hint\" and \"entity\")."
        }
    }
}

/// Diagram source generation, specialized per diagram shape
///
/// The user message for this call carries the structured content produced
/// by the previous step.
pub fn diagram_system(diagram_type: DiagramType) -> &'static str {
    match diagram_type {
        DiagramType::Flowchart => {
            "Convert the given topic and steps into Mermaid flowchart source. Start \
             with 'flowchart TD'. Output only the Mermaid source, no fences, no prose."
        }
        DiagramType::RadialMindmap => {
            "Convert the given topic and facts into Mermaid mindmap source. Start with \
             'mindmap' and put the topic at the root. Output only the Mermaid source, \
             no fences, no prose."
        }
        DiagramType::SequenceComparison => {
            "Convert the given topic and comparison points into Mermaid sequenceDiagram \
             source, one participant per compared subject. Start with \
             'sequenceDiagram'. Output only the Mermaid source, no fences, no prose."
        }
    }
}
