//! The security gate: authorizes reads, writes and command execution.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::scope::{ExecutePolicy, SecurityScope, is_within};
use crate::io::paths;

/// Immutable permission checker for one session.
///
/// Scope paths are resolved once at construction; queried paths are resolved
/// on every check. All predicates are total: anything that cannot be resolved
/// is denied.
#[derive(Debug, Clone)]
pub struct SecurityGate {
    scope: SecurityScope,
}

impl SecurityGate {
    /// Build a gate from a scope whose paths may be relative or unresolved.
    ///
    /// Entries that cannot be resolved are dropped (and grant nothing).
    pub fn new(scope: SecurityScope) -> Self {
        let SecurityScope {
            read_paths,
            write_paths,
            execute,
        } = scope;
        let scope = SecurityScope {
            read_paths: resolve_all(read_paths, "read"),
            write_paths: resolve_all(write_paths, "write"),
            execute,
        };
        debug!(
            read = scope.read_paths.len(),
            write = scope.write_paths.len(),
            execute = %scope.execute.describe(),
            "security gate ready"
        );
        Self { scope }
    }

    /// A gate that grants nothing.
    pub fn deny_all() -> Self {
        Self {
            scope: SecurityScope::default(),
        }
    }

    pub fn scope(&self) -> &SecurityScope {
        &self.scope
    }

    pub fn can_read(&self, path: impl AsRef<Path>) -> bool {
        self.check_path(path.as_ref(), &self.scope.read_paths, "read")
    }

    pub fn can_write(&self, path: impl AsRef<Path>) -> bool {
        self.check_path(path.as_ref(), &self.scope.write_paths, "write")
    }

    pub fn can_execute(&self, command: &str) -> bool {
        let allowed = self.scope.execute.permits(command);
        debug!(command, allowed, "execute check");
        allowed
    }

    pub fn execute_policy(&self) -> &ExecutePolicy {
        &self.scope.execute
    }

    /// Human-readable scope summary: `read: ...; write: ...; execute: ...`.
    pub fn describe(&self) -> String {
        format!(
            "read: {}; write: {}; execute: {}",
            describe_paths(&self.scope.read_paths),
            describe_paths(&self.scope.write_paths),
            self.scope.execute.describe()
        )
    }

    fn check_path(&self, path: &Path, bases: &[PathBuf], op: &str) -> bool {
        let allowed = paths::resolve(path).is_some_and(|resolved| is_within(&resolved, bases));
        debug!(op, path = %path.display(), allowed, "path check");
        allowed
    }
}

/// Render resolved scope paths for prompts and denial messages.
pub fn describe_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "none".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn resolve_all(paths: Vec<PathBuf>, op: &str) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter_map(|path| {
            let resolved = paths::resolve(&path);
            if resolved.is_none() {
                warn!(op, path = %path.display(), "dropping unresolvable scope path");
            }
            resolved
        })
        .collect()
}
