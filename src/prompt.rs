// Prompt rendering: turns a ContentRecord into a provider-agnostic prompt.
//
// The same prompt goes to every provider. It spells out the JSON shape we
// expect back and the filtering rules, so the parser has a fighting chance
// even with chatty models. Rendering is pure: no clock, no randomness.

use std::fmt::Write;

use crate::error::ExtractError;
use crate::models::ContentRecord;
use crate::output::truncate_chars;

/// Bodies longer than this are cut before rendering.
pub const DEFAULT_MAX_BODY_CHARS: usize = 12_000;

/// Filtering rules embedded in the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRules {
    pub max_topics: usize,
    pub min_confidence: f64,
    pub max_body_chars: usize,
}

impl Default for PromptRules {
    fn default() -> Self {
        Self {
            max_topics: 5,
            min_confidence: 0.6,
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
        }
    }
}

/// Render a content record into a prompt.
///
/// Fails with `InvalidInput` only when both title and body are blank.
pub fn build_prompt(content: &ContentRecord, rules: &PromptRules) -> Result<String, ExtractError> {
    let title = content.title.trim();
    let body = content.body.trim();
    if title.is_empty() && body.is_empty() {
        return Err(ExtractError::InvalidInput(
            "content record has neither a title nor a body".to_string(),
        ));
    }

    let mut prompt = String::with_capacity(body.len().min(rules.max_body_chars) + 1024);

    prompt.push_str(
        "Identify the main topics of the following content. Topics should be \
         specific subjects a reader would search for, not generic words.\n\n",
    );

    prompt.push_str("<content>\n");
    if !title.is_empty() {
        let _ = writeln!(prompt, "Title: {title}");
    }
    let url = content.url.trim();
    if !url.is_empty() {
        let _ = writeln!(prompt, "URL: {url}");
    }
    if let Some(description) = content.description.as_deref().map(str::trim) {
        if !description.is_empty() {
            let _ = writeln!(prompt, "Description: {description}");
        }
    }
    if !body.is_empty() {
        let _ = writeln!(prompt, "Body:\n{}", truncate_chars(body, rules.max_body_chars));
    }
    prompt.push_str("</content>\n\n");

    prompt.push_str("Rules:\n");
    let _ = writeln!(prompt, "- Return at most {} topics.", rules.max_topics);
    let _ = writeln!(
        prompt,
        "- Only include topics with confidence of at least {}.",
        rules.min_confidence
    );
    prompt.push_str(
        "- \"name\" must be a lowercase slug: letters and digits separated by single hyphens \
         (e.g. \"machine-learning\").\n",
    );
    prompt.push_str("- \"confidence\" is a number between 0.0 and 1.0.\n");
    prompt.push_str("- Order topics from most to least confident.\n\n");

    prompt.push_str(
        "Respond with only a JSON array, no prose and no markdown, in this format:\n\
         [\n  {\n    \"name\": \"topic-slug\",\n    \"display_name\": \"Topic Name\",\n    \
         \"confidence\": 0.9,\n    \"reasoning\": \"One sentence on why this topic applies.\"\n  }\n]\n",
    );

    Ok(prompt)
}
