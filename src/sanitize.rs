//! Diagram source sanitization
//!
//! Deterministic textual repair of generated diagram source before it is
//! handed to the rendering collaborator. Pure, no failure mode - always
//! returns a string, possibly unchanged.
//!
//! Passes run in strict order so later passes see already-normalized
//! input; each pass is idempotent, so `sanitize(sanitize(s)) ==
//! sanitize(s)` holds for the whole chain. A leading configuration
//! directive block is held aside first and reinserted unchanged at the
//! end, so no text-mangling pass can corrupt it.

use regex::Regex;
use std::sync::LazyLock;

/// Sanitize generated diagram source
pub fn sanitize(raw: &str) -> String {
    let (directive, body) = split_directive_block(raw);

    let body = strip_fences(body);
    let body = decode_entities(&decode_entities(&body));
    let body = replace_unsafe_chars(&body);
    let body = normalize_line_breaks(&body);
    let body = fix_keyword_spacing(&body);
    let body = reindent_flowchart(&body);
    let body = body
        .lines()
        .map(fix_line)
        .collect::<Vec<_>>()
        .join("\n");

    match directive {
        Some(block) => format!("{}\n{}", block, body),
        None => body,
    }
}

/// Split off a leading `%%{ ... }%%` configuration directive block
///
/// The block is returned verbatim; later passes never see it.
fn split_directive_block(raw: &str) -> (Option<&str>, &str) {
    let trimmed = raw.trim_start();
    if !trimmed.starts_with("%%{") {
        return (None, raw);
    }
    match trimmed.find("}%%") {
        Some(end) => {
            let block = &trimmed[..end + 3];
            (Some(block), &trimmed[end + 3..])
        }
        None => (None, raw),
    }
}

/// Strip a markdown fence wrapper, tolerating a language tag
fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => return trimmed.to_string(),
    };
    match body.rfind("```") {
        Some(idx) => body[..idx].trim().to_string(),
        None => body.trim().to_string(),
    }
}

/// Decode common HTML entities
///
/// Called twice by the pipeline to catch double-encoded output
/// (`&amp;quot;` and friends).
fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
}

/// Fixed table of typographically-unsafe characters and their
/// diagram-language-safe equivalents
const UNSAFE_CHARS: &[(char, &str)] = &[
    (';', ","),
    ('\u{2014}', "-"),  // em dash
    ('\u{2013}', "-"),  // en dash
    ('\u{201C}', "'"),  // left smart double quote
    ('\u{201D}', "'"),  // right smart double quote
    ('\u{2018}', "'"),  // left smart single quote
    ('\u{2019}', "'"),  // right smart single quote
    ('\u{20AC}', "EUR"),
    ('\u{00A3}', "GBP"),
    ('\u{00A5}', "JPY"),
    ('\u{2122}', "(TM)"),
    ('\u{00AE}', "(R)"),
    ('\u{00A9}', "(C)"),
    ('\\', "/"),
];

fn replace_unsafe_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match UNSAFE_CHARS.iter().find(|(c, _)| *c == ch) {
            Some((_, replacement)) => out.push_str(replacement),
            None => out.push(ch),
        }
    }
    out
}

static BR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("br regex must compile"));

/// Normalize every line-break markup variant to `<br/>`
fn normalize_line_breaks(text: &str) -> String {
    BR_RE.replace_all(text, "<br/>").into_owned()
}

static KEYWORD_SPACING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(\s*)(flowchart|graph)(TD|TB|LR|RL|BT)\b")
        .expect("keyword spacing regex must compile")
});

/// Insert the missing space between a diagram keyword and its direction
/// (`flowchartTD` -> `flowchart TD`)
fn fix_keyword_spacing(text: &str) -> String {
    KEYWORD_SPACING_RE
        .replace_all(text, "$1$2 $3")
        .into_owned()
}

static DIRECTION_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(flowchart|graph)\s+(TD|TB|LR|RL|BT)\s*$")
        .expect("direction header regex must compile")
});

/// Re-indent node-declaration lines that follow a direction header
///
/// Only applies to flowchart/graph sources; mindmap indentation is
/// semantic and must not be touched.
fn reindent_flowchart(text: &str) -> String {
    let mut lines = text.lines();
    let Some(first) = lines.next() else {
        return text.to_string();
    };
    if !DIRECTION_HEADER_RE.is_match(first.trim()) {
        return text.to_string();
    }

    let mut out = vec![first.trim().to_string()];
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            out.push(String::new());
        } else if trimmed.starts_with("subgraph")
            || trimmed == "end"
            || trimmed.starts_with("%%")
            || trimmed.starts_with("classDef")
            || trimmed.starts_with("style")
        {
            out.push(trimmed.to_string());
        } else {
            out.push(format!("    {}", trimmed));
        }
    }
    out.join("\n")
}

static SAFE_SUBGRAPH_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[A-Za-z0-9_]+(\s*\[.*\])?$"#).expect("subgraph id regex must compile")
});

/// Per-line repairs: malformed subgraph headers and stray quotes inside
/// bracket-delimited node labels
fn fix_line(line: &str) -> String {
    let indent_len = line.len() - line.trim_start().len();
    let (indent, rest) = line.split_at(indent_len);

    if let Some(header) = rest.strip_prefix("subgraph ") {
        let header = header.trim();
        if !SAFE_SUBGRAPH_ID_RE.is_match(header) {
            let safe_id = sanitize_identifier(header);
            // Brackets inside the title would change where the label ends
            let title = header.replace('"', "'").replace('[', "(").replace(']', ")");
            return format!("{}subgraph {}[\"{}\"]", indent, safe_id, title);
        }
    }

    format!("{}{}", indent, fix_bracket_quotes(rest))
}

/// Collapse a free-form title into a safe identifier token
fn sanitize_identifier(text: &str) -> String {
    let mut out = String::new();
    let mut last_was_sep = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep && !out.is_empty() {
            out.push('_');
            last_was_sep = true;
        }
    }
    let out = out.trim_end_matches('_').to_string();
    if out.is_empty() { "sg".to_string() } else { out }
}

/// Repair stray double quotes inside `[...]` node labels
///
/// A quoted label keeps its delimiter quotes and converts embedded ones
/// to single quotes; an unquoted label containing quotes has them all
/// converted.
fn fix_bracket_quotes(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.char_indices().peekable();
    let bytes = line;

    while let Some((idx, ch)) = chars.next() {
        if ch != '[' {
            out.push(ch);
            continue;
        }
        // Find the closing bracket for this label
        let Some(close_rel) = bytes[idx + 1..].find(']') else {
            out.push(ch);
            continue;
        };
        let close = idx + 1 + close_rel;
        let content = &bytes[idx + 1..close];
        out.push('[');
        out.push_str(&repair_label_quotes(content));
        out.push(']');
        // Skip everything up to and including the closing bracket
        while let Some(&(next_idx, _)) = chars.peek() {
            if next_idx > close {
                break;
            }
            chars.next();
        }
    }
    out
}

fn repair_label_quotes(content: &str) -> String {
    if !content.contains('"') {
        return content.to_string();
    }
    if content.len() >= 2 && content.starts_with('"') && content.ends_with('"') {
        let inner = &content[1..content.len() - 1];
        format!("\"{}\"", inner.replace('"', "'"))
    } else {
        content.replace('"', "'")
    }
}
