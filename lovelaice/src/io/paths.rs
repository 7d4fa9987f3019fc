//! Path resolution for permission checks.
//!
//! Produces absolute, symlink-resolved paths so containment checks cannot be
//! fooled by relative paths, `..` segments or links pointing outside a scope.
//! Paths that do not exist yet (a file about to be written) resolve through
//! their longest existing ancestor; a `..` that cancels a missing directory
//! drops back onto resolved ground and resolution continues from there.

use std::path::{Component, Path, PathBuf};

use tracing::trace;

/// Resolve `path` against the process working directory.
///
/// Returns `None` when the path cannot be resolved (empty, contains NUL, a
/// dangling link, or the working directory is unavailable).
pub fn resolve(path: impl AsRef<Path>) -> Option<PathBuf> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return None;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    resolve_absolute(&absolute)
}

/// Resolve an absolute path component by component.
///
/// Every component that exists is canonicalized, including ones reached after
/// a `..` that cancelled a missing directory. Missing components are kept
/// verbatim. A dangling link is unresolvable, since writing through it would
/// land wherever it points.
pub fn resolve_absolute(absolute: &Path) -> Option<PathBuf> {
    if absolute.as_os_str().as_encoded_bytes().contains(&0) {
        return None;
    }
    if !absolute.is_absolute() {
        return None;
    }

    let mut resolved = PathBuf::new();
    // Trailing components of `resolved` that do not exist on disk.
    let mut missing = 0usize;
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                resolved.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
                missing = missing.saturating_sub(1);
            }
            Component::Normal(name) if missing > 0 => {
                resolved.push(name);
                missing += 1;
            }
            Component::Normal(name) => {
                let candidate = resolved.join(name);
                match candidate.canonicalize() {
                    Ok(canonical) => resolved = canonical,
                    Err(_) if candidate.symlink_metadata().is_ok() => {
                        trace!(link = %candidate.display(), "dangling link");
                        return None;
                    }
                    Err(_) => {
                        resolved = candidate;
                        missing = 1;
                    }
                }
            }
        }
    }
    trace!(path = %absolute.display(), resolved = %resolved.display(), missing, "resolved path");
    Some(resolved)
}
