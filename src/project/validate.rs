//! Project directory validation
//!
//! Checks hit the filesystem every time. Other tools may delete or move a project
//! directory at any moment, so a cached answer would be worthless.

use std::io;
use std::path::Path;

use crate::model::Project;

/// Why a path did or did not pass validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCheck {
    Valid,
    Empty,
    Missing,
    NotADirectory,
    /// Exists but could not be stat'ed or listed (permissions, I/O error)
    Inaccessible,
}

impl PathCheck {
    pub fn is_valid(self) -> bool {
        self == PathCheck::Valid
    }
}

/// True only when the project's path is an accessible directory. Never fails.
pub async fn validate_project_path(project: &Project) -> bool {
    check_path(&project.path).await.is_valid()
}

pub async fn check_path(path: &Path) -> PathCheck {
    if path.as_os_str().is_empty() {
        return PathCheck::Empty;
    }

    // `metadata` follows symlinks, so a dangling link reads as missing
    let is_dir = tokio::fs::metadata(path).await.map(|meta| meta.is_dir());
    let listing = match is_dir {
        Ok(true) => Some(tokio::fs::read_dir(path).await.map(|_| ())),
        _ => None,
    };
    classify(is_dir, listing)
}

/// Map the stat and listing results onto a `PathCheck`
fn classify(is_dir: io::Result<bool>, listing: Option<io::Result<()>>) -> PathCheck {
    match is_dir {
        Err(e) if e.kind() == io::ErrorKind::NotFound => PathCheck::Missing,
        Err(_) => PathCheck::Inaccessible,
        Ok(false) => PathCheck::NotADirectory,
        Ok(true) => match listing {
            Some(Ok(())) => PathCheck::Valid,
            _ => PathCheck::Inaccessible,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn project_at(path: impl Into<PathBuf>) -> Project {
        Project::new("p".to_string(), path.into())
    }

    #[tokio::test]
    async fn test_directory_is_valid() {
        let dir = tempdir().unwrap();
        assert!(validate_project_path(&project_at(dir.path())).await);
    }

    #[tokio::test]
    async fn test_missing_file_and_empty_are_invalid() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert_eq!(check_path(&dir.path().join("nope")).await, PathCheck::Missing);
        assert_eq!(check_path(&file).await, PathCheck::NotADirectory);
        assert_eq!(check_path(Path::new("")).await, PathCheck::Empty);
        assert!(!validate_project_path(&project_at(file)).await);
        assert!(!validate_project_path(&project_at("")).await);
    }

    #[tokio::test]
    async fn test_deleted_between_calls() {
        let dir = tempdir().unwrap();
        let project_dir = dir.path().join("proj");
        fs::create_dir(&project_dir).unwrap();
        let project = project_at(&project_dir);

        assert!(validate_project_path(&project).await);
        fs::remove_dir(&project_dir).unwrap();
        assert!(!validate_project_path(&project).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target");
        fs::create_dir(&target).unwrap();

        let good = dir.path().join("good-link");
        std::os::unix::fs::symlink(&target, &good).unwrap();
        assert_eq!(check_path(&good).await, PathCheck::Valid);

        let dangling = dir.path().join("dangling-link");
        std::os::unix::fs::symlink(dir.path().join("gone"), &dangling).unwrap();
        assert_eq!(check_path(&dangling).await, PathCheck::Missing);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users read through permission bits; nothing to observe then
        if fs::read_dir(&locked).is_err() {
            assert_eq!(check_path(&locked).await, PathCheck::Inaccessible);
        } else {
            eprintln!("Running with elevated privileges, skipping on-disk permission check");
        }

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_permission_denied_is_inaccessible() {
        let denied = || io::Error::from(io::ErrorKind::PermissionDenied);

        assert_eq!(classify(Err(denied()), None), PathCheck::Inaccessible);
        assert_eq!(classify(Ok(true), Some(Err(denied()))), PathCheck::Inaccessible);
        assert_eq!(
            classify(Err(io::Error::from(io::ErrorKind::NotFound)), None),
            PathCheck::Missing
        );
        assert_eq!(classify(Ok(false), None), PathCheck::NotADirectory);
        assert_eq!(classify(Ok(true), Some(Ok(()))), PathCheck::Valid);
    }
}
