// Response parsing: recovers a topic list from raw provider text.
//
// Models are told to reply with a bare JSON array, but in practice the
// array arrives wrapped in markdown fences, preceded by "Here are the
// topics:", or followed by a closing remark. We peel those layers off,
// validate each element, then apply the confidence floor and topic cap.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::models::Topic;

static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap());

/// Post-validation filtering applied to parsed topics.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRules {
    pub min_confidence: f64,
    pub max_topics: usize,
    /// Treat an empty result after filtering as a malformed response.
    pub require_topics: bool,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            max_topics: 5,
            require_topics: false,
        }
    }
}

/// Parse raw provider text into a filtered, confidence-ordered topic list.
pub fn parse_topics(raw: &str, rules: &FilterRules) -> Result<Vec<Topic>, ExtractError> {
    let candidates = parse_candidates(raw)?;
    let total = candidates.len();
    let topics = filter_topics(candidates, rules);

    debug!(
        candidates = total,
        kept = topics.len(),
        min_confidence = rules.min_confidence,
        "Parsed topics"
    );

    if topics.is_empty() && rules.require_topics {
        return Err(ExtractError::MalformedResponse(format!(
            "no topics at or above confidence {} ({} candidates)",
            rules.min_confidence, total
        )));
    }

    Ok(topics)
}

/// Recover the JSON array and validate its elements, in reply order.
///
/// Invalid elements are dropped with a warning. Only a missing array is an error.
pub fn parse_candidates(raw: &str) -> Result<Vec<Topic>, ExtractError> {
    let elements = extract_array(raw)?;

    Ok(elements
        .iter()
        .enumerate()
        .filter_map(|(idx, element)| match validate_topic(element) {
            Ok(topic) => Some(topic),
            Err(reason) => {
                warn!(index = idx, reason = %reason, "Dropping invalid topic element");
                None
            }
        })
        .collect())
}

/// Drop low-confidence topics and repeated names, cap the count, then order
/// by confidence.
///
/// Of several topics sharing a name, the first one in reply order that meets
/// the confidence floor is kept. The cap is applied in reply order, before
/// sorting. The sort is stable so equal confidences keep their reply order.
pub fn filter_topics(mut topics: Vec<Topic>, rules: &FilterRules) -> Vec<Topic> {
    topics.retain(|t| t.confidence >= rules.min_confidence);
    let mut seen = HashSet::new();
    topics.retain(|t| {
        let first = seen.insert(t.name.clone());
        if !first {
            warn!(name = %t.name, "Dropping duplicate topic");
        }
        first
    });
    topics.truncate(rules.max_topics);
    topics.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
    topics
}

/// Turn a free-form name into a slug: lowercase ASCII alphanumerics joined by
/// single hyphens. Returns an empty string if nothing usable remains.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

pub fn is_valid_slug(name: &str) -> bool {
    SLUG.is_match(name)
}

fn extract_array(raw: &str) -> Result<Vec<Value>, ExtractError> {
    let text = strip_fence(raw.trim());

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if let Some(items) = topic_array(value) {
            return Ok(items);
        }
    }

    // Prose around the array: try each balanced [...] span. Prefer the first
    // array that holds objects so "see [1]" style footnotes don't win.
    let mut fallback = None;
    for span in bracket_spans(text) {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(span) {
            if items.iter().any(Value::is_object) {
                return Ok(items);
            }
            fallback.get_or_insert(items);
        }
    }

    fallback.ok_or_else(|| {
        ExtractError::MalformedResponse(format!(
            "no JSON array found in response: {}",
            crate::output::truncate_chars(raw.trim(), 120)
        ))
    })
}

/// Accept a bare array, or an object carrying the array under "topics".
fn topic_array(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("topics") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

/// Remove a leading ``` fence (with optional language tag) and its closer.
fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Every top-level balanced `[...]` span in `text`, in order.
///
/// Brackets inside JSON strings don't count. An unclosed `[` is skipped and
/// scanning resumes right after it.
fn bracket_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut offset = 0;

    while offset < text.len() {
        let mut depth = 0usize;
        let mut start = 0;
        let mut in_string = false;
        let mut escaped = false;

        for (i, c) in text[offset..].char_indices() {
            let i = offset + i;
            if depth == 0 {
                if c == '[' {
                    depth = 1;
                    start = i;
                }
                continue;
            }
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        spans.push(&text[start..=i]);
                    }
                }
                _ => {}
            }
        }

        if depth == 0 {
            break;
        }
        offset = start + 1;
    }

    spans
}

fn validate_topic(element: &Value) -> Result<Topic, String> {
    let obj = element
        .as_object()
        .ok_or_else(|| "element is not a JSON object".to_string())?;

    let raw_name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| "missing or non-string 'name'".to_string())?;
    if raw_name.chars().any(|c| c.is_alphanumeric() && !c.is_ascii()) {
        return Err(format!("name {raw_name:?} has non-ASCII letters"));
    }
    let name = slugify(raw_name);
    if !is_valid_slug(&name) {
        return Err(format!("name {raw_name:?} has no usable slug"));
    }

    let confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| "missing or non-numeric 'confidence'".to_string())?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!("confidence {confidence} outside [0, 1]"));
    }

    let display_name = match obj.get("display_name").or_else(|| obj.get("displayName")) {
        None | Some(Value::Null) => raw_name.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err("non-string 'display_name'".to_string()),
    };

    let reasoning = match obj.get("reasoning") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err("non-string 'reasoning'".to_string()),
    };

    Ok(Topic {
        name,
        display_name,
        confidence,
        reasoning,
    })
}
