//! Normalized outcome of one tool call.

use crate::core::message::Message;

/// Error text recorded when the user answers `no` at the confirmation gate.
pub const USER_DECLINED: &str = "user declined";

/// Result of one tool invocation. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub ok: bool,
    pub output: String,
    pub error: Option<String>,
}

impl InvocationResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            ok: true,
            output: output.into(),
            error: None,
        }
    }

    /// A failed call whose handler still produced output (e.g. a non-zero
    /// exit or a permission denial). The output doubles as the error text.
    pub fn failed_with_output(output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            ok: false,
            error: Some(output.clone()),
            output,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn declined() -> Self {
        Self::failure(USER_DECLINED)
    }

    pub fn is_declined(&self) -> bool {
        !self.ok && self.error.as_deref() == Some(USER_DECLINED)
    }

    /// System-role observation recording this result for tool `tool`.
    pub fn to_observation(&self, tool: &str) -> Message {
        if self.ok {
            Message::system(format!("Tool {tool} result: {}", self.output))
        } else {
            let error = self.error.as_deref().unwrap_or("unknown error");
            Message::system(format!("Tool {tool} failed: {error}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;

    #[test]
    fn success_observation() {
        let msg = InvocationResult::success("3 files").to_observation("list_dir");
        assert_eq!(msg.role(), Role::System);
        assert_eq!(msg.content(), "Tool list_dir result: 3 files");
    }

    #[test]
    fn declined_observation() {
        let result = InvocationResult::declined();
        assert!(result.is_declined());
        assert_eq!(
            result.to_observation("delete_path").content(),
            "Tool delete_path failed: user declined"
        );
    }

    #[test]
    fn failed_with_output_keeps_both() {
        let result = InvocationResult::failed_with_output("Permission Denied");
        assert!(!result.ok);
        assert_eq!(result.output, "Permission Denied");
        assert_eq!(result.error.as_deref(), Some("Permission Denied"));
        assert!(!result.is_declined());
    }
}
