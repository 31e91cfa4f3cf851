//! Durable ledger of branches created through branchyard
//!
//! Entries outlive their worktrees: deleting a worktree directory (by us or by
//! anyone else) never drops the branch from the ledger. Only `untrack` does.

use anyhow::Result;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::naming::{normalize_path, resolve_path};
use crate::model::TrackedBranch;
use crate::store::{load_json, save_json};

/// Resolved repository path -> branches, oldest first
type Ledger = BTreeMap<String, Vec<TrackedBranch>>;

pub struct BranchTracker {
    ledger_path: PathBuf,
    /// Serializes read-modify-write cycles so concurrent `track` calls never lose an entry
    write_lock: Mutex<()>,
}

impl BranchTracker {
    pub fn new(ledger_path: PathBuf) -> Self {
        Self {
            ledger_path,
            write_lock: Mutex::new(()),
        }
    }

    /// Record a branch for a repository. Idempotent per `(repository, branch)`.
    ///
    /// Returns true if a new entry was written.
    pub async fn track(&self, repository_path: &Path, branch_name: &str) -> Result<bool> {
        let key = ledger_key(repository_path);
        let _guard = self.write_lock.lock().await;

        let mut ledger: Ledger = load_json(&self.ledger_path).await?;
        let entries = ledger.entry(key.clone()).or_default();
        if entries.iter().any(|b| b.branch_name == branch_name) {
            debug!(repository = %key, branch = branch_name, "branch already tracked");
            return Ok(false);
        }

        entries.push(TrackedBranch {
            project_path: key.clone(),
            branch_name: branch_name.to_string(),
            created_at: Utc::now(),
        });
        save_json(&self.ledger_path, &ledger).await?;
        debug!(repository = %key, branch = branch_name, "tracked branch");
        Ok(true)
    }

    /// Explicitly forget a branch. Returns true if an entry was removed.
    pub async fn untrack(&self, repository_path: &Path, branch_name: &str) -> Result<bool> {
        let key = ledger_key(repository_path);
        let _guard = self.write_lock.lock().await;

        let mut ledger: Ledger = load_json(&self.ledger_path).await?;
        let Some(entries) = ledger.get_mut(&key) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|b| b.branch_name != branch_name);
        if entries.len() == before {
            return Ok(false);
        }
        if entries.is_empty() {
            ledger.remove(&key);
        }

        save_json(&self.ledger_path, &ledger).await?;
        Ok(true)
    }

    /// All tracked branches for a repository, newest first
    ///
    /// Live worktree presence is not consulted.
    pub async fn list(&self, repository_path: &Path) -> Result<Vec<TrackedBranch>> {
        let key = ledger_key(repository_path);
        let mut ledger: Ledger = load_json(&self.ledger_path).await?;
        let mut entries = ledger.remove(&key).unwrap_or_default();

        // Reverse first so equal timestamps still come out newest-appended first
        entries.reverse();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}

/// The same repository maps to one key however its path is spelled
fn ledger_key(repository_path: &Path) -> String {
    normalize_path(&resolve_path(repository_path))
}
