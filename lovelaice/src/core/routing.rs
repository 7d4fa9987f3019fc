//! Deterministic interpretation of classification replies.
//!
//! The completion service is asked to answer with a single capability name.
//! Models pad that answer with whitespace, punctuation or quotes, so replies
//! are normalized before being matched against the registered names.

/// Outcome of matching a classification reply against registered names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// The reply named a registered capability (canonical name).
    Matched(String),
    /// The reply matched nothing; callers fall back to their default.
    Unmatched(String),
}

impl RouteDecision {
    pub fn matched(&self) -> Option<&str> {
        match self {
            RouteDecision::Matched(name) => Some(name),
            RouteDecision::Unmatched(_) => None,
        }
    }
}

/// Strip a raw reply down to the candidate name.
///
/// Keeps the first whitespace-separated token, then trims surrounding quotes
/// and backticks and trailing `,` `.` `:`.
pub fn normalize_reply(reply: &str) -> String {
    let first = reply.split_whitespace().next().unwrap_or("");
    first
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '*'))
        .trim_end_matches([',', '.', ':'])
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '*'))
        .to_string()
}

/// Match a raw classification reply against `names` (case-insensitive).
pub fn decide<'a, I>(reply: &str, names: I) -> RouteDecision
where
    I: IntoIterator<Item = &'a str>,
{
    let candidate = normalize_reply(reply);
    names
        .into_iter()
        .find(|name| !candidate.is_empty() && name.eq_ignore_ascii_case(&candidate))
        .map(|name| RouteDecision::Matched(name.to_string()))
        .unwrap_or(RouteDecision::Unmatched(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_whitespace_and_trailing_punctuation() {
        assert_eq!(normalize_reply("  basic.\n"), "basic");
        assert_eq!(normalize_reply("chat:"), "chat");
        assert_eq!(normalize_reply("compute,"), "compute");
        assert_eq!(normalize_reply("`basic`."), "basic");
        assert_eq!(normalize_reply("\"chat\""), "chat");
    }

    #[test]
    fn normalize_keeps_first_token_only() {
        assert_eq!(normalize_reply("basic because it needs a tool"), "basic");
        assert_eq!(normalize_reply(""), "");
    }

    #[test]
    fn decide_matches_case_insensitively() {
        let decision = decide("Basic.", ["chat", "basic"]);
        assert_eq!(decision, RouteDecision::Matched("basic".to_string()));
        assert_eq!(decision.matched(), Some("basic"));
    }

    #[test]
    fn decide_reports_unmatched_candidate() {
        let decision = decide("dance!", ["chat", "basic"]);
        assert_eq!(decision, RouteDecision::Unmatched("dance!".to_string()));
        assert_eq!(decision.matched(), None);
    }

    #[test]
    fn decide_empty_reply_is_unmatched() {
        assert_eq!(
            decide("   ", ["chat"]),
            RouteDecision::Unmatched(String::new())
        );
    }
}
