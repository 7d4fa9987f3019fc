//! Confirmation gate vocabulary: answers and argument rendering.

use serde_json::Value;

/// Longest argument value shown verbatim in a confirmation prompt.
pub const DISPLAY_VALUE_LIMIT: usize = 150;

/// The three answers the confirmation gate accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Explain,
}

impl Answer {
    /// Parse a typed answer. Returns `None` for anything outside the three choices.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(Answer::Yes),
            "n" | "no" => Some(Answer::No),
            "e" | "explain" => Some(Answer::Explain),
            _ => None,
        }
    }
}

/// Render tool arguments as `key: value` lines for the prompt detail.
///
/// String values are shown without quotes; long values are cut at
/// [`DISPLAY_VALUE_LIMIT`] characters and suffixed with `...`.
pub fn render_arguments(args: &Value) -> String {
    match args {
        Value::Object(map) if map.is_empty() => "(no arguments)".to_string(),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{key}: {}", display_value(value)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => display_value(other),
    }
}

fn display_value(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    truncate_chars(&raw, DISPLAY_VALUE_LIMIT)
}

fn truncate_chars(raw: &str, limit: usize) -> String {
    match raw.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &raw[..cut]),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_accepts_short_and_long_forms() {
        assert_eq!(Answer::parse("y"), Some(Answer::Yes));
        assert_eq!(Answer::parse(" YES "), Some(Answer::Yes));
        assert_eq!(Answer::parse("n"), Some(Answer::No));
        assert_eq!(Answer::parse("no"), Some(Answer::No));
        assert_eq!(Answer::parse("e"), Some(Answer::Explain));
        assert_eq!(Answer::parse("Explain"), Some(Answer::Explain));
    }

    #[test]
    fn parse_rejects_other_input() {
        assert_eq!(Answer::parse(""), None);
        assert_eq!(Answer::parse("maybe"), None);
        assert_eq!(Answer::parse("yess"), None);
    }

    #[test]
    fn render_lists_arguments() {
        let rendered = render_arguments(&json!({"command": "git", "args": ["status"]}));
        assert!(rendered.contains("command: git"));
        assert!(rendered.contains(r#"args: ["status"]"#));
    }

    #[test]
    fn render_truncates_long_values() {
        let long = "x".repeat(400);
        let rendered = render_arguments(&json!({ "content": long }));
        assert_eq!(rendered, format!("content: {}...", "x".repeat(150)));
    }

    #[test]
    fn render_empty_object() {
        assert_eq!(render_arguments(&json!({})), "(no arguments)");
    }
}
