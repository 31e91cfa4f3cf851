//! Directory naming for worktrees

use std::path::{Component, Path, PathBuf};

/// Directory that holds every worktree of a repository
pub const WORKTREES_DIR: &str = ".worktrees";

/// Project a branch name onto a directory-safe identifier
///
/// Every character outside `[A-Za-z0-9_-]` becomes `-`. The branch itself keeps
/// its original name; only the directory uses this form.
pub fn sanitize_worktree_name(branch_name: &str) -> String {
    branch_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Render a path with `/` as the only separator
///
/// Paths built with `Path::join` and paths printed by git then compare equal on
/// every host.
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Drop `.` components, fold `..` into its parent and strip trailing separators
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if cleaned.file_name().is_some() {
                    cleaned.pop();
                } else if !cleaned.has_root() {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// One spelling per location: cleaned, then canonicalized when the path (or its
/// parent, for a path that is already gone) exists
pub fn resolve_path(path: &Path) -> PathBuf {
    let cleaned = clean_path(path);
    if let Ok(real) = std::fs::canonicalize(&cleaned) {
        return real;
    }
    if let (Some(parent), Some(name)) = (cleaned.parent(), cleaned.file_name()) {
        if let Ok(real_parent) = std::fs::canonicalize(parent) {
            return real_parent.join(name);
        }
    }
    cleaned
}
