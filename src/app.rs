use crate::config::Config;
use crate::message::Message;
use crate::project::{
    check_path, validate_project_path, OsTrash, ProjectRegistry, RegistryError, RepairChoice,
    TrashFacility,
};
use crate::worktree::{self, BranchTracker};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Owns the durable state and routes each request to the right component
pub struct App {
    config: Config,
    registry: ProjectRegistry,
    tracker: BranchTracker,
}

impl App {
    pub async fn init(config: Config) -> Result<Self> {
        Self::with_trash(config, Arc::new(OsTrash)).await
    }

    pub async fn with_trash(config: Config, os_trash: Arc<dyn TrashFacility>) -> Result<Self> {
        let registry = ProjectRegistry::load(config.registry_file(), os_trash)
            .await
            .context("Failed to load project registry")?;
        let tracker = BranchTracker::new(config.branch_ledger_file());
        Ok(Self {
            config,
            registry,
            tracker,
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.registry.shutdown().await
    }

    /// Handle one request. The JSON result is for the caller to present.
    pub async fn update(&self, msg: Message) -> Result<Value> {
        debug!(?msg, "handling message");
        let timeout = self.config.git_timeout;

        let value = match msg {
            Message::AddProject { path, name } => {
                let path = absolutize(&path)?;
                let project = self
                    .registry
                    .add_project(name.as_deref().unwrap_or(""), path)
                    .await?;
                serde_json::to_value(project)?
            }
            Message::OpenProject(id) => serde_json::to_value(self.registry.open_project(&id).await?)?,
            Message::ListProjects => {
                let (history, history_index) = self.registry.history();
                json!({
                    "current": self.registry.current_project(),
                    "projects": self.registry.projects(),
                    "trashed": self.registry.trashed_projects(),
                    "history": history,
                    "history_index": history_index,
                })
            }
            Message::ValidateProjectPath(id) => {
                let state = self.registry.snapshot();
                let project = state
                    .project(&id)
                    .or_else(|| state.trashed(&id).map(|t| &t.project))
                    .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
                let valid = validate_project_path(project).await;
                let mut report = json!({ "id": id, "path": project.path, "valid": valid });
                if !valid {
                    report["reason"] = json!(format!("{:?}", check_path(&project.path).await));
                }
                report
            }
            Message::CyclePrevProject => serde_json::to_value(self.registry.cycle_prev_project().await?)?,
            Message::CycleNextProject => serde_json::to_value(self.registry.cycle_next_project().await?)?,

            Message::TrashProject(id) => serde_json::to_value(self.registry.trash_project(&id).await?)?,
            Message::RestoreTrashedProject(id) => {
                serde_json::to_value(self.registry.restore_trashed_project(&id).await?)?
            }
            Message::DeleteTrashedProjectFromDisk(id) => {
                self.registry.delete_trashed_project_from_disk(&id).await?;
                json!({ "deleted": id })
            }
            Message::EmptyTrash => json!({ "removed": self.registry.empty_trash().await? }),

            Message::RelocateProject { id, path } => {
                let choice = RepairChoice::Relocate(absolutize(&path)?);
                serde_json::to_value(self.registry.resolve_repair(&id, choice).await?)?
            }
            Message::RemoveProject(id) => {
                serde_json::to_value(self.registry.resolve_repair(&id, RepairChoice::Remove).await?)?
            }
            Message::DismissProject(id) => {
                serde_json::to_value(self.registry.resolve_repair(&id, RepairChoice::Dismiss).await?)?
            }

            Message::CreateWorktree {
                repository,
                branch,
                base,
            } => {
                let repository = absolutize(&repository)?;
                let wt = worktree::create_worktree(
                    &repository,
                    &branch,
                    base.as_deref(),
                    &self.tracker,
                    timeout,
                )
                .await?;
                serde_json::to_value(wt)?
            }
            Message::RemoveWorktree {
                repository,
                worktree: worktree_path,
            } => {
                let repository = absolutize(&repository)?;
                let worktree_path = absolutize(&worktree_path)?;
                worktree::remove_worktree(&repository, &worktree_path, timeout).await?;
                json!({ "removed": worktree::normalize_path(&worktree_path) })
            }
            Message::ListWorktrees(repository) => {
                let repository = absolutize(&repository)?;
                serde_json::to_value(worktree::list_worktrees(&repository, timeout).await?)?
            }

            Message::ListTrackedBranches(repository) => {
                let repository = absolutize(&repository)?;
                serde_json::to_value(self.tracker.list(&repository).await?)?
            }
            Message::TrackBranch { repository, branch } => {
                let repository = absolutize(&repository)?;
                json!({ "added": self.tracker.track(&repository, &branch).await? })
            }
            Message::UntrackBranch { repository, branch } => {
                let repository = absolutize(&repository)?;
                json!({ "removed": self.tracker.untrack(&repository, &branch).await? })
            }
        };

        Ok(value)
    }
}

/// Resolve a relative path against the working directory
fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() || path.as_os_str().is_empty() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}
