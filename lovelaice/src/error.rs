//! Typed root causes the engine's callers need to tell apart.
//!
//! Everything is propagated as `anyhow::Error`; match on a cause with
//! `err.downcast_ref::<EngineError>()`.

use thiserror::Error;

use crate::tools::Dependency;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("duplicate {kind} '{name}'")]
    DuplicateCapability { kind: &'static str, name: String },

    #[error("unknown skill '{name}'")]
    UnknownSkill { name: String },

    #[error("unknown tool '{name}'")]
    UnknownTool { name: String },

    #[error("no default skill registered")]
    MissingDefaultSkill,

    #[error("could not build arguments for tool '{tool}': {message}")]
    ParameterSynthesis { tool: String, message: String },

    #[error("tool '{tool}' did not declare the {kind} dependency")]
    MissingDependency { tool: String, kind: Dependency },

    #[error("skill '{skill}' finished without replying")]
    NoReply { skill: String },

    #[error("cancelled")]
    Cancelled,
}

impl EngineError {
    /// True if `err` has [`EngineError::Cancelled`] as its root cause.
    pub fn is_cancelled(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<EngineError>(), Some(EngineError::Cancelled))
    }
}
