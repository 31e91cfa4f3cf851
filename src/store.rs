//! JSON state files under the data directory

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Read a JSON file, falling back to `T::default()` when it does not exist yet
pub async fn load_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match tokio::fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Write a JSON file atomically (temp file + rename)
///
/// A crash mid-write leaves either the old file or the new one, never a torn mix.
pub async fn save_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(value)?;
    let temp_path = temp_path_for(path);

    tokio::fs::write(&temp_path, content)
        .await
        .with_context(|| format!("Failed to write {}", temp_path.display()))?;

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_missing_file_yields_default() {
        let dir = tempdir().unwrap();
        let value: BTreeMap<String, u32> = load_json(&dir.path().join("nope.json")).await.unwrap();
        assert!(value.is_empty());
    }

    #[tokio::test]
    async fn test_save_creates_parent_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut value = BTreeMap::new();
        value.insert("a".to_string(), 1u32);
        save_json(&path, &value).await.unwrap();

        let loaded: BTreeMap<String, u32> = load_json(&path).await.unwrap();
        assert_eq!(loaded.get("a"), Some(&1));
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let result: Result<BTreeMap<String, u32>> = load_json(&path).await;
        assert!(result.is_err());
    }
}
