//! Extraction of structured document updates from assistant replies.
//!
//! The model is asked to return edits as a JSON object with an
//! `updatedHtml` field, usually fenced in a code block with explanatory
//! prose around it. Replies are messy in practice: the object may arrive
//! bare, embedded mid-sentence, with literal newlines inside its string
//! values, or not at all. Extraction is best-effort; a reply with no
//! parseable update is treated as plain explanation, never as an error.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());

/// What an assistant reply contained: an optional document update plus
/// the prose around it.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    /// Replacement document HTML, if the reply carried one.
    pub html: Option<String>,
    /// Everything the model said outside the update payload. When no
    /// update is present this is the whole reply.
    pub explanation: String,
}

/// Pull a document update out of a raw assistant reply.
///
/// Tried in order: the whole trimmed reply as a JSON object, then each
/// fenced code block, then any balanced `{...}` span in the text. The
/// first candidate that parses and carries `updatedHtml` wins.
pub fn parse_assistant_reply(message: &str) -> AssistantReply {
    let trimmed = message.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        if let Some(html) = updated_html(trimmed) {
            return AssistantReply {
                html: Some(html),
                explanation: String::new(),
            };
        }
    }

    if let Some(reply) = parse_fenced(message) {
        return reply;
    }
    if let Some(reply) = parse_embedded(message) {
        return reply;
    }

    AssistantReply {
        html: None,
        explanation: message.to_string(),
    }
}

fn parse_fenced(message: &str) -> Option<AssistantReply> {
    for caps in FENCE_RE.captures_iter(message) {
        let object = caps.get(1)?.as_str();
        let html = match updated_html(object) {
            Some(html) => html,
            None => continue,
        };
        let whole = caps.get(0)?;
        return Some(with_surrounding_prose(
            message,
            whole.start(),
            whole.end(),
            html,
        ));
    }
    None
}

fn parse_embedded(message: &str) -> Option<AssistantReply> {
    for (start, _) in message.match_indices('{') {
        let object = match balanced_object(&message[start..]) {
            Some(object) => object,
            None => continue,
        };
        let html = match updated_html(object) {
            Some(html) => html,
            None => continue,
        };
        return Some(with_surrounding_prose(
            message,
            start,
            start + object.len(),
            html,
        ));
    }
    None
}

fn with_surrounding_prose(message: &str, start: usize, end: usize, html: String) -> AssistantReply {
    let mut prose = Vec::new();
    let before = message[..start].trim();
    let after = message[end..].trim();
    if !before.is_empty() {
        prose.push(before);
    }
    if !after.is_empty() {
        prose.push(after);
    }
    AssistantReply {
        html: Some(html),
        explanation: prose.join("\n\n"),
    }
}

/// Parse a candidate JSON object and return its `updatedHtml` value.
fn updated_html(candidate: &str) -> Option<String> {
    if !candidate.contains("updatedHtml") {
        return None;
    }
    let repaired = escape_control_chars(candidate);
    let value: serde_json::Value = serde_json::from_str(&repaired).ok()?;
    let html = value.get("updatedHtml")?.as_str()?;
    Some(strip_document_wrapper(html).to_string())
}

/// Escape literal control characters inside JSON string values. Model
/// output frequently embeds raw newlines in the HTML string, which is
/// invalid JSON as written.
fn escape_control_chars(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;
    for ch in json.chars() {
        if escaped {
            out.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => {
                out.push(ch);
                escaped = true;
            }
            '"' => {
                out.push(ch);
                in_string = !in_string;
            }
            '\n' if in_string => out.push_str("\\n"),
            '\t' if in_string => out.push_str("\\t"),
            '\r' if in_string => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

/// Find the balanced `{...}` span at the start of `text`, honoring JSON
/// string and escape rules so braces inside string values don't count.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
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
                    return Some(&text[..i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// The model sometimes echoes the `<document>` wrapper from the system
/// prompt around its HTML; it is not part of the document.
fn strip_document_wrapper(html: &str) -> &str {
    let trimmed = html.trim();
    match trimmed
        .strip_prefix("<document>")
        .and_then(|rest| rest.strip_suffix("</document>"))
    {
        Some(inner) => inner.trim(),
        None => trimmed,
    }
}
