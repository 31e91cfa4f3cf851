use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_GIT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_FILTER: &str = "info";

/// Optional overrides read from `<data_dir>/config.json`
#[derive(Debug, Deserialize, Default)]
struct PartialConfig {
    git_timeout_secs: Option<u64>,
    log_filter: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Upper bound on any single git invocation
    pub git_timeout: Duration,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            git_timeout: Duration::from_secs(DEFAULT_GIT_TIMEOUT_SECS),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Defaults, then `config.json`, then environment variables
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = non_empty_env("BRANCHYARD_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        config.apply_file(&config.data_dir.join("config.json"))?;

        if let Some(secs) = non_empty_env("BRANCHYARD_GIT_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("BRANCHYARD_GIT_TIMEOUT_SECS is not a number: {secs}"))?;
            config.git_timeout = Duration::from_secs(secs);
        }
        if let Some(filter) = non_empty_env("BRANCHYARD_LOG") {
            config.log_filter = filter;
        }

        Ok(config)
    }

    /// Config rooted at an explicit data directory, ignoring the environment
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn registry_file(&self) -> PathBuf {
        self.data_dir.join("registry.json")
    }

    pub fn branch_ledger_file(&self) -> PathBuf {
        self.data_dir.join("tracked-branches.json")
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("branchyard.log")
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let parsed: PartialConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        if let Some(secs) = parsed.git_timeout_secs {
            self.git_timeout = Duration::from_secs(secs);
        }
        if let Some(filter) = parsed.log_filter {
            if !filter.trim().is_empty() {
                self.log_filter = filter;
            }
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("branchyard")
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{ "git_timeout_secs": 5, "log_filter": "debug" }"#,
        )
        .unwrap();

        let mut config = Config::with_data_dir(dir.path());
        config.apply_file(&dir.path().join("config.json")).unwrap();

        assert_eq!(config.git_timeout, Duration::from_secs(5));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_blank_log_filter_keeps_default() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{ "log_filter": "  " }"#).unwrap();

        let mut config = Config::with_data_dir(dir.path());
        config.apply_file(&dir.path().join("config.json")).unwrap();

        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.git_timeout, Duration::from_secs(DEFAULT_GIT_TIMEOUT_SECS));
    }

    #[test]
    fn test_missing_file_is_fine() {
        let dir = tempdir().unwrap();
        let mut config = Config::with_data_dir(dir.path());
        config.apply_file(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.registry_file(), dir.path().join("registry.json"));
    }
}
