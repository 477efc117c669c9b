//! Turning model text into validated JSON.

use ideaforge_utils::error::LlmError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Opening line of a fenced block: ``` plus an optional language tag.
static FENCE_OPENING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("fence pattern compiles")
});

/// Longest excerpt of an unparseable answer kept in the error.
const EXCERPT_CHARS: usize = 120;

/// Remove the enclosing code-fence markup around a model answer.
///
/// The block runs from the first opening fence to the last closing fence,
/// so fenced snippets nested inside JSON string values stay intact. Text
/// without a fence is returned trimmed.
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(opening) = FENCE_OPENING.find(trimmed) else {
        return trimmed;
    };
    let body = &trimmed[opening.end()..];
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Parse a model answer as JSON.
///
/// The answer is parsed as-is first; fences are only stripped when that
/// fails, since a bare JSON answer may carry fenced markdown in its strings.
///
/// # Errors
///
/// `LlmError::InvalidJson` when the text is not JSON.
pub fn parse_json(text: &str) -> Result<Value, LlmError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }
    let body = strip_code_fences(trimmed);
    serde_json::from_str(body).map_err(|err| {
        let excerpt: String = body.chars().take(EXCERPT_CHARS).collect();
        LlmError::InvalidJson(format!("{err} (response starts with: {excerpt:?})"))
    })
}

/// Validate `value` against a JSON Schema.
///
/// # Errors
///
/// - `LlmError::SchemaViolation` listing every violation
/// - `LlmError::Misconfiguration` when the schema itself does not compile
pub fn validate_against(value: &Value, schema: &Value) -> Result<(), LlmError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|err| LlmError::Misconfiguration(format!("invalid response schema: {err}")))?;
    if validator.is_valid(value) {
        return Ok(());
    }
    let messages: Vec<String> = validator
        .iter_errors(value)
        .map(|err| err.to_string())
        .collect();
    Err(LlmError::SchemaViolation(messages.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json_untouched() {
        assert_eq!(strip_code_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn test_strips_tagged_fence() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(text), "{\"a\": 1}");
    }

    #[test]
    fn test_strips_untagged_fence() {
        assert_eq!(strip_code_fences("```\n[1, 2]\n```"), "[1, 2]");
    }

    #[test]
    fn test_fence_with_surrounding_prose() {
        let text = "Here is the plan:\n```json\n[{\"unit\": \"SchemaAgent\"}]\n```\nEnjoy!";
        assert_eq!(strip_code_fences(text), "[{\"unit\": \"SchemaAgent\"}]");
    }

    #[test]
    fn test_parse_json_reports_invalid() {
        match parse_json("Sorry, I can't help with that.") {
            Err(LlmError::InvalidJson(msg)) => assert!(msg.contains("Sorry")),
            other => panic!("Expected InvalidJson, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_json_after_fence() {
        let value = parse_json("```json\n{\"title\": \"Todo\"}\n```").unwrap();
        assert_eq!(value["title"], "Todo");
    }

    const NESTED_FENCE_BUNDLE: &str =
        r##"{"API_Design.md": "# API\n\n```json\n{\"id\": 1}\n```\n", "User_Flow.md": "# Flow"}"##;

    #[test]
    fn test_bare_json_with_fenced_string_value() {
        let value = parse_json(NESTED_FENCE_BUNDLE).unwrap();
        assert_eq!(value["API_Design.md"], "# API\n\n```json\n{\"id\": 1}\n```\n");
        assert_eq!(value["User_Flow.md"], "# Flow");
    }

    #[test]
    fn test_outer_fence_keeps_nested_fences() {
        let text = format!("```json\n{NESTED_FENCE_BUNDLE}\n```");
        let value = parse_json(&text).unwrap();
        assert_eq!(value["API_Design.md"], "# API\n\n```json\n{\"id\": 1}\n```\n");
    }

    #[test]
    fn test_prose_around_fence_with_nested_fences() {
        let text = format!("Here are the files:\n```json\n{NESTED_FENCE_BUNDLE}\n```\nDone.");
        let value = parse_json(&text).unwrap();
        assert_eq!(value["User_Flow.md"], "# Flow");
    }

    #[test]
    fn test_single_line_fence() {
        assert_eq!(strip_code_fences("```[1, 2]```"), "[1, 2]");
    }

    #[test]
    fn test_schema_violation_lists_problems() {
        let schema = json!({
            "type": "object",
            "required": ["title", "summary"],
            "properties": {"title": {"type": "string"}}
        });
        assert!(validate_against(&json!({"title": "a", "summary": "b"}), &schema).is_ok());
        match validate_against(&json!({"title": 3}), &schema) {
            Err(LlmError::SchemaViolation(msg)) => assert!(msg.contains("summary")),
            other => panic!("Expected SchemaViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_schema_is_misconfiguration() {
        let schema = json!({"type": "not-a-type"});
        assert!(matches!(
            validate_against(&json!({}), &schema),
            Err(LlmError::Misconfiguration(_))
        ));
    }
}
