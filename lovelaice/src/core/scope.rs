//! Permission scopes and the pure checks behind the security gate.
//!
//! Everything here operates on paths that were already resolved to absolute,
//! symlink-free form (see [`crate::io::paths`]). Containment is decided on
//! path components, never on string prefixes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Which commands the agent may execute.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExecutePolicy {
    /// No command may run.
    #[default]
    Deny,
    /// Any command may run.
    AllowAll,
    /// Only commands whose base token is listed verbatim may run.
    AllowList(BTreeSet<String>),
}

impl ExecutePolicy {
    pub fn allow_list<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllowList(commands.into_iter().map(Into::into).collect())
    }

    /// Decide whether `command` may run under this policy.
    pub fn permits(&self, command: &str) -> bool {
        match self {
            ExecutePolicy::Deny => false,
            ExecutePolicy::AllowAll => true,
            ExecutePolicy::AllowList(allowed) => {
                base_token(command).is_some_and(|token| allowed.contains(token))
            }
        }
    }

    /// Short human-readable summary used in denial messages.
    pub fn describe(&self) -> String {
        match self {
            ExecutePolicy::Deny => "none".to_string(),
            ExecutePolicy::AllowAll => "all".to_string(),
            ExecutePolicy::AllowList(allowed) if allowed.is_empty() => "none".to_string(),
            ExecutePolicy::AllowList(allowed) => {
                allowed.iter().cloned().collect::<Vec<_>>().join(", ")
            }
        }
    }
}

/// Resolved read/write/execute permissions for one session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityScope {
    pub read_paths: Vec<PathBuf>,
    pub write_paths: Vec<PathBuf>,
    pub execute: ExecutePolicy,
}

/// Return `true` if `target` equals or descends from any of `bases`.
pub fn is_within(target: &Path, bases: &[PathBuf]) -> bool {
    bases.iter().any(|base| target.starts_with(base))
}

/// Program a command line would invoke: its first whitespace-separated
/// token, kept as written.
///
/// A path-qualified program such as `/tmp/git` is its own token and only
/// matches an allow-list entry spelling out that same path.
pub fn base_token(command: &str) -> Option<&str> {
    command.split_whitespace().next()
}
