use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Persisted project registry state
///
/// Every mutation goes through `ProjectRegistry`, which keeps the invariant
/// that an id lives in at most one of `projects` / `trashed_projects`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryState {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub trashed_projects: Vec<TrashedProject>,
    /// Visit order, most recent first. May hold ids that are no longer active.
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub history_index: usize,
    #[serde(default)]
    pub current_project_id: Option<String>,
}

impl RegistryState {
    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn project_mut(&mut self, id: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    pub fn trashed(&self, id: &str) -> Option<&TrashedProject> {
        self.trashed_projects.iter().find(|t| t.project.id == id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.projects.iter().any(|p| p.id == id)
    }

    pub fn current_project(&self) -> Option<&Project> {
        self.current_project_id
            .as_deref()
            .and_then(|id| self.project(id))
    }

    /// Clear the current project if it is `id`
    pub fn clear_current_if(&mut self, id: &str) {
        if self.current_project_id.as_deref() == Some(id) {
            self.current_project_id = None;
        }
    }
}

/// A project the user has registered, backed by a directory on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub last_opened: DateTime<Utc>,
}

impl Project {
    pub fn new(name: String, path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            path,
            last_opened: Utc::now(),
        }
    }
}

/// A project sitting in the in-app trash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashedProject {
    #[serde(flatten)]
    pub project: Project,
    pub trashed_at: DateTime<Utc>,
}

impl TrashedProject {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            trashed_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.project.id
    }
}

/// A freshly created worktree. Not persisted; the directory may vanish at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Worktree {
    /// Path with `/` as the only separator
    pub path: String,
    pub branch: String,
    /// True when the branch did not exist before this worktree was created
    pub is_new: bool,
}

/// Ledger entry for a branch created through this tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedBranch {
    pub project_path: String,
    pub branch_name: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trashed_project_serializes_flat() {
        let project = Project::new("demo".to_string(), PathBuf::from("/tmp/demo"));
        let trashed = TrashedProject::new(project.clone());
        let value = serde_json::to_value(&trashed).unwrap();

        assert_eq!(value["id"], project.id.as_str());
        assert_eq!(value["name"], "demo");
        assert!(value.get("trashed_at").is_some());
        assert!(value.get("project").is_none());
    }

    #[test]
    fn test_registry_state_defaults_missing_fields() {
        let state: RegistryState = serde_json::from_str("{}").unwrap();
        assert!(state.projects.is_empty());
        assert!(state.trashed_projects.is_empty());
        assert!(state.history.is_empty());
        assert_eq!(state.history_index, 0);
        assert!(state.current_project_id.is_none());
    }

    #[test]
    fn test_clear_current_if_only_matches_same_id() {
        let mut state = RegistryState {
            current_project_id: Some("a".to_string()),
            ..Default::default()
        };
        state.clear_current_if("b");
        assert_eq!(state.current_project_id.as_deref(), Some("a"));
        state.clear_current_if("a");
        assert!(state.current_project_id.is_none());
    }
}
