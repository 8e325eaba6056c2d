//! Response parsing for provider output
//!
//! The LLM is not guaranteed to return clean JSON. Parsing applies a
//! strict-to-loose cascade, each layer a pure function chained with
//! early-return-on-success:
//!
//! 1. strip markdown code fences if present
//! 2. direct JSON parse
//! 3. extract the first balanced `{...}` span and retry JSON parse
//! 4. line-oriented heuristics (topic markers, bullets, ordinals)
//!
//! A deterministic spacing-repair table fixes known concatenation defects
//! in generated prose. Unified/combined shapes additionally require a
//! locatable diagram source, recovered from the parsed JSON or by
//! pattern-matching known diagram-language start tokens in the raw text.

use crate::error::{AppError, AppResult};
use crate::types::{DiagramType, FactMetadata};
use regex::Regex;
use std::sync::LazyLock;

/// Shape the caller expects the raw output to carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedShape {
    /// All artifacts together: type, topic, facts, universal prose,
    /// diagram source, metadata
    Unified,
    /// Structured content plus diagram source (sequential strategy's
    /// combined step)
    Combined,
    /// Structured content only, for a known diagram type; no diagram
    /// source required
    Single(DiagramType),
}

/// Structured fields extracted from raw provider output
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOutput {
    pub diagram_type: Option<DiagramType>,
    pub topic: String,
    pub facts: Vec<String>,
    pub universal: Option<String>,
    pub diagram_source: Option<String>,
    pub meta: Option<Vec<FactMetadata>>,
}

impl ParsedOutput {
    /// Assemble the canonical structured-content form: a `Topic:` line
    /// followed by `-` bullets, one per fact
    pub fn structured_content(&self) -> String {
        let mut out = format!("Topic: {}", self.topic);
        for fact in &self.facts {
            out.push_str("\n- ");
            out.push_str(fact);
        }
        out
    }
}

/// Parse raw provider output into structured fields
///
/// # Errors
/// - `Parse` when no layer of the cascade yields a usable topic or facts
/// - `MissingDiagramSource` when the expected shape requires diagram
///   source and none can be located by any method. Fatal for the calling
///   strategy; never retried locally.
pub fn parse(raw: &str, shape: ExpectedShape, stage: &'static str) -> AppResult<ParsedOutput> {
    let stripped = strip_code_fences(raw);

    let mut parsed = parse_json_layer(&stripped)
        .or_else(|| {
            extract_balanced_object(&stripped)
                .as_deref()
                .and_then(parse_json_layer)
        })
        .unwrap_or_else(|| line_heuristics(&stripped));

    // Deterministic text repair on every prose field
    parsed.topic = repair_spacing(&parsed.topic);
    parsed.facts = parsed.facts.iter().map(|f| repair_spacing(f)).collect();
    parsed.universal = parsed.universal.as_deref().map(repair_spacing);

    if parsed.topic.trim().is_empty() {
        match parsed.facts.first() {
            Some(first) => parsed.topic = first.clone(),
            None => {
                return Err(AppError::Parse {
                    stage,
                    reason: "no topic or facts could be extracted".to_string(),
                });
            }
        }
    }

    // Metadata is only usable when it aligns positionally with the facts
    if let Some(meta) = &parsed.meta {
        if meta.len() != parsed.facts.len() {
            tracing::warn!(
                stage = stage,
                meta_len = meta.len(),
                fact_len = parsed.facts.len(),
                "Dropping fact metadata: count does not match bullet facts"
            );
            parsed.meta = None;
        }
    }

    if matches!(shape, ExpectedShape::Unified | ExpectedShape::Combined) {
        if parsed
            .diagram_source
            .as_deref()
            .is_none_or(|s| s.trim().is_empty())
        {
            parsed.diagram_source = extract_diagram_source(raw);
        }
        if parsed
            .diagram_source
            .as_deref()
            .is_none_or(|s| s.trim().is_empty())
        {
            return Err(AppError::MissingDiagramSource { stage });
        }
    }

    if let ExpectedShape::Single(diagram_type) = shape {
        parsed.diagram_type.get_or_insert(diagram_type);
    }

    Ok(parsed)
}

// ── Layer 1: fence stripping ────────────────────────────────────────────

/// Strip a single markdown code fence wrapper, tolerating a language tag
///
/// Returns the input unchanged when no fence wraps it.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the language tag line (```json, ```mermaid, or bare ```)
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => return trimmed.to_string(),
    };
    match body.rfind("```") {
        Some(idx) => body[..idx].trim().to_string(),
        None => body.trim().to_string(),
    }
}

// ── Layers 2-3: JSON ────────────────────────────────────────────────────

fn parse_json_layer(text: &str) -> Option<ParsedOutput> {
    let value: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
    let obj = value.as_object()?;

    let topic = string_field(obj, &["topic", "title"]).unwrap_or_default();
    let universal = string_field(obj, &["universal", "universal_content", "content"]);
    let diagram_source = string_field(obj, &["diagram", "diagram_source", "mermaid"]);
    let diagram_type = obj
        .get("diagram_type")
        .or_else(|| obj.get("diagramType"))
        .and_then(|v| v.as_str())
        .and_then(DiagramType::from_keyword);

    let mut facts = Vec::new();
    let mut meta = Vec::new();
    let mut meta_complete = true;
    if let Some(items) = obj.get("facts").and_then(|v| v.as_array()) {
        for item in items {
            match item {
                serde_json::Value::String(s) => {
                    facts.push(s.clone());
                    meta_complete = false;
                }
                serde_json::Value::Object(fact) => {
                    let Some(text) = fact.get("text").and_then(|v| v.as_str()) else {
                        continue;
                    };
                    facts.push(text.to_string());
                    match fact_metadata(fact) {
                        Some(m) => meta.push(m),
                        None => meta_complete = false,
                    }
                }
                _ => {}
            }
        }
    }

    if topic.trim().is_empty() && facts.is_empty() && diagram_source.is_none() {
        return None;
    }

    let meta = (meta_complete && !meta.is_empty()).then_some(meta);
    Some(ParsedOutput {
        diagram_type,
        topic,
        facts,
        universal,
        diagram_source,
        meta,
    })
}

fn string_field(
    obj: &serde_json::Map<String, serde_json::Value>,
    names: &[&str],
) -> Option<String> {
    names
        .iter()
        .find_map(|n| obj.get(*n))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn fact_metadata(fact: &serde_json::Map<String, serde_json::Value>) -> Option<FactMetadata> {
    let theme = fact.get("theme").and_then(|v| v.as_str())?;
    let keywords = fact
        .get("keywords")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let search_hint = fact
        .get("search_hint")
        .or_else(|| fact.get("searchHint"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let entity = fact
        .get("entity")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    Some(FactMetadata {
        theme: theme.to_string(),
        keywords,
        search_hint,
        entity,
    })
}

/// Extract the first balanced `{...}` span, respecting string literals
/// and escapes
pub fn extract_balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + offset + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

// ── Layer 4: line heuristics ────────────────────────────────────────────

static ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}[.)]\s+").expect("ordinal regex must compile"));

fn line_heuristics(text: &str) -> ParsedOutput {
    let mut topic = String::new();
    let mut facts = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed
            .strip_prefix("Topic:")
            .or_else(|| trimmed.strip_prefix("TOPIC:"))
            .or_else(|| trimmed.strip_prefix("# "))
        {
            if topic.is_empty() {
                topic = rest.trim().to_string();
            }
            continue;
        }
        if let Some(rest) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
            .or_else(|| trimmed.strip_prefix("\u{2022} "))
        {
            facts.push(rest.trim().to_string());
            continue;
        }
        if let Some(m) = ORDINAL_RE.find(trimmed) {
            facts.push(trimmed[m.end()..].trim().to_string());
            continue;
        }
        if trimmed.chars().count() > 10 {
            facts.push(trimmed.to_string());
        }
    }

    ParsedOutput {
        diagram_type: None,
        topic,
        facts,
        universal: None,
        diagram_source: None,
        meta: None,
    }
}

// ── Text repair ─────────────────────────────────────────────────────────

/// Fixed table of spacing defects: a suffix-ending word glued to a known
/// following word. Not a general grammar fix.
static SPACING_TABLE: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"\b(\w+(?:tion|sion|ment|ness|ance|ence|ship|ity))(of|to|in|and|the|for|with|between)\b")
                .expect("spacing regex must compile"),
            "$1 $2",
        ),
        (
            Regex::new(r"\b(\w+ing)(the|of|to|and|for)\b").expect("spacing regex must compile"),
            "$1 $2",
        ),
    ]
});

/// Apply the deterministic spacing-repair table
pub fn repair_spacing(text: &str) -> String {
    let mut out = text.to_string();
    for (re, replacement) in SPACING_TABLE.iter() {
        out = re.replace_all(&out, *replacement).into_owned();
    }
    out
}

// ── Diagram source recovery ─────────────────────────────────────────────

const DIAGRAM_START_TOKENS: &[&str] = &["%%{", "flowchart ", "graph ", "mindmap", "sequenceDiagram"];

/// Locate diagram source inside arbitrary raw text by its start token
///
/// Takes everything from the first recognized token line to the end of
/// the enclosing fence (or end of text).
pub fn extract_diagram_source(raw: &str) -> Option<String> {
    let mut start_byte = None;
    let mut offset = 0usize;
    'outer: for line in raw.split_inclusive('\n') {
        let trimmed = line.trim_start();
        for token in DIAGRAM_START_TOKENS {
            if trimmed.starts_with(token) {
                start_byte = Some(offset + (line.len() - trimmed.len()));
                break 'outer;
            }
        }
        offset += line.len();
    }
    let start = start_byte?;
    let tail = &raw[start..];
    let body = match tail.find("```") {
        Some(idx) => &tail[..idx],
        None => tail,
    };
    let body = body.trim_end();
    (!body.is_empty()).then(|| body.to_string())
}
