//! The project registry: active projects, in-app trash, visit history
//!
//! Per project id: `Active -> Trashed -> Active (restore) | Gone (delete)`.
//! Mutations are computed on a copy of the state, written to disk, and only then
//! swapped in, so a failed write leaves memory and disk untouched.

use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::history::{plan_cycle, CycleDirection, CycleSkip};
use super::os_trash::TrashFacility;
use super::validate::check_path;
use crate::model::{Project, RegistryState, TrashedProject};
use crate::store::{load_json, save_json};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("Not an accessible directory: {0}")]
    PathInvalid(String),

    #[error("Cannot restore project {id}: {path} is missing or not a directory. Relocate it or delete it permanently.")]
    RestoreRefused { id: String, path: String },

    #[error("System trash is not available on this host")]
    TrashUnavailable,

    #[error("Failed to move project to system trash: {0}")]
    TrashFailed(String),

    #[error("Another trash operation is already running")]
    Busy,

    #[error("Failed to save project registry: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// Result of trying to make a project current
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "project", rename_all = "snake_case")]
pub enum Activation {
    Opened(Project),
    /// The directory is gone or unusable; the caller must offer a `RepairChoice`
    NeedsRepair(Project),
}

/// What the user picked when a project's directory failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairChoice {
    Relocate(PathBuf),
    Remove,
    Dismiss,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "project", rename_all = "snake_case")]
pub enum RepairOutcome {
    Relocated(Project),
    Removed,
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "project", rename_all = "snake_case")]
pub enum CycleOutcome {
    Switched(Project),
    NoOp,
    /// Another cycle was still in flight
    Busy,
}

/// Held while a latched operation runs; releases on drop
struct Latch<'a>(&'a AtomicBool);

impl<'a> Latch<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Latch(flag))
    }
}

impl Drop for Latch<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ProjectRegistry {
    state: Mutex<RegistryState>,
    state_file: PathBuf,
    /// Single writer: held across the copy/persist/swap of every mutation
    write_lock: tokio::sync::Mutex<()>,
    os_trash: Arc<dyn TrashFacility>,
    cycling: AtomicBool,
    /// Shared by `empty_trash` and `delete_trashed_project_from_disk`
    trash_busy: AtomicBool,
}

impl ProjectRegistry {
    /// Load persisted state, repairing anything that breaks the registry invariants
    pub async fn load(state_file: PathBuf, os_trash: Arc<dyn TrashFacility>) -> anyhow::Result<Self> {
        let mut state: RegistryState = load_json(&state_file).await?;

        let active: Vec<String> = state.projects.iter().map(|p| p.id.clone()).collect();
        let before = state.trashed_projects.len();
        state.trashed_projects.retain(|t| !active.contains(&t.project.id));
        if state.trashed_projects.len() != before {
            warn!("dropped trashed records whose id is also active");
        }
        if let Some(id) = state.current_project_id.clone() {
            if !state.is_active(&id) {
                state.current_project_id = None;
            }
        }

        debug!(
            projects = state.projects.len(),
            trashed = state.trashed_projects.len(),
            "loaded project registry"
        );

        Ok(Self {
            state: Mutex::new(state),
            state_file,
            write_lock: tokio::sync::Mutex::new(()),
            os_trash,
            cycling: AtomicBool::new(false),
            trash_busy: AtomicBool::new(false),
        })
    }

    /// Flush state to disk
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let _writer = self.write_lock.lock().await;
        let snapshot = self.snapshot();
        save_json(&self.state_file, &snapshot).await
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> RegistryState {
        self.state().clone()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.state().projects.clone()
    }

    pub fn trashed_projects(&self) -> Vec<TrashedProject> {
        self.state().trashed_projects.clone()
    }

    pub fn current_project(&self) -> Option<Project> {
        self.state().current_project().cloned()
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        self.state().project(id).cloned()
    }

    /// Visit history (most recent first) and the current index into it
    pub fn history(&self) -> (Vec<String>, usize) {
        let state = self.state();
        (state.history.clone(), state.history_index)
    }

    /// Apply `f` to a copy of the state, persist it, then publish it
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut RegistryState) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let _writer = self.write_lock.lock().await;
        let mut next = self.snapshot();
        let value = f(&mut next)?;
        save_json(&self.state_file, &next).await?;
        *self.state() = next;
        Ok(value)
    }

    /// Register a directory as a project. A path that is already registered
    /// returns the existing record.
    pub async fn add_project(&self, name: &str, path: PathBuf) -> Result<Project, RegistryError> {
        if !check_path(&path).await.is_valid() {
            return Err(RegistryError::PathInvalid(path.display().to_string()));
        }

        let name = if name.trim().is_empty() {
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string())
        } else {
            name.trim().to_string()
        };

        if let Some(existing) = self.state().projects.iter().find(|p| p.path == path) {
            return Ok(existing.clone());
        }

        // Re-checked under the writer so concurrent adds of one path insert once
        let candidate = Project::new(name, path);
        let (project, inserted) = self
            .mutate(move |state| {
                if let Some(existing) = state.projects.iter().find(|p| p.path == candidate.path) {
                    return Ok((existing.clone(), false));
                }
                state.projects.push(candidate.clone());
                Ok((candidate, true))
            })
            .await?;

        if inserted {
            info!(id = %project.id, path = %project.path.display(), "added project");
        }
        Ok(project)
    }

    /// Make a project current, provided its directory still validates
    pub async fn open_project(&self, id: &str) -> Result<Activation, RegistryError> {
        let project = self
            .project(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let check = check_path(&project.path).await;
        if !check.is_valid() {
            info!(id, ?check, "project path failed validation, repair needed");
            return Ok(Activation::NeedsRepair(project));
        }

        let opened = self.mutate(|state| activate(state, id)).await?;
        Ok(Activation::Opened(opened))
    }

    /// Move an active project into the in-app trash
    pub async fn trash_project(&self, id: &str) -> Result<TrashedProject, RegistryError> {
        let trashed = self
            .mutate(|state| {
                let idx = state
                    .projects
                    .iter()
                    .position(|p| p.id == id)
                    .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
                let trashed = TrashedProject::new(state.projects.remove(idx));
                state.trashed_projects.push(trashed.clone());
                state.clear_current_if(id);
                Ok(trashed)
            })
            .await?;

        info!(id, "moved project to trash");
        Ok(trashed)
    }

    /// Bring a trashed project back. Refused while its directory fails validation.
    ///
    /// History and the current project are left alone.
    pub async fn restore_trashed_project(&self, id: &str) -> Result<Project, RegistryError> {
        let trashed = self
            .state()
            .trashed(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        if !check_path(&trashed.project.path).await.is_valid() {
            return Err(RegistryError::RestoreRefused {
                id: id.to_string(),
                path: trashed.project.path.display().to_string(),
            });
        }

        let restored = self
            .mutate(|state| {
                let idx = state
                    .trashed_projects
                    .iter()
                    .position(|t| t.project.id == id)
                    .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
                let project = state.trashed_projects.remove(idx).project;
                state.projects.push(project.clone());
                Ok(project)
            })
            .await?;

        info!(id, "restored project from trash");
        Ok(restored)
    }

    /// Send a trashed project's directory to the host trash, then forget the project
    pub async fn delete_trashed_project_from_disk(&self, id: &str) -> Result<(), RegistryError> {
        let Some(_latch) = Latch::try_acquire(&self.trash_busy) else {
            return Err(RegistryError::Busy);
        };

        let trashed = self
            .state()
            .trashed(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        if !self.os_trash.is_available() {
            return Err(RegistryError::TrashUnavailable);
        }

        let path = trashed.project.path.clone();
        if tokio::fs::symlink_metadata(&path).await.is_ok() {
            let os_trash = Arc::clone(&self.os_trash);
            let blocking_path = path.clone();
            tokio::task::spawn_blocking(move || os_trash.move_to_trash(&blocking_path))
                .await
                .map_err(|e| RegistryError::TrashFailed(e.to_string()))?
                .map_err(|e| RegistryError::TrashFailed(format!("{:#}", e)))?;
        } else {
            debug!(id, path = %path.display(), "directory already gone, skipping system trash");
        }

        self.mutate(|state| {
            state.trashed_projects.retain(|t| t.project.id != id);
            Ok(())
        })
        .await?;

        info!(id, path = %path.display(), "deleted project from disk");
        Ok(())
    }

    /// Forget every trashed project. Directories are not touched.
    ///
    /// Returns how many records were dropped.
    pub async fn empty_trash(&self) -> Result<usize, RegistryError> {
        let Some(_latch) = Latch::try_acquire(&self.trash_busy) else {
            return Err(RegistryError::Busy);
        };

        if self.state().trashed_projects.is_empty() {
            return Ok(0);
        }

        let count = self
            .mutate(|state| {
                let count = state.trashed_projects.len();
                state.trashed_projects.clear();
                Ok(count)
            })
            .await?;

        info!(count, "emptied trash");
        Ok(count)
    }

    /// Act on the user's answer after `open_project` returned `NeedsRepair`
    ///
    /// A rejected relocation changes nothing, so the caller can ask again.
    pub async fn resolve_repair(&self, id: &str, choice: RepairChoice) -> Result<RepairOutcome, RegistryError> {
        match choice {
            RepairChoice::Relocate(new_path) => {
                if !check_path(&new_path).await.is_valid() {
                    return Err(RegistryError::PathInvalid(new_path.display().to_string()));
                }
                let project = self
                    .mutate(|state| {
                        state
                            .project_mut(id)
                            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?
                            .path = new_path;
                        activate(state, id)
                    })
                    .await?;
                info!(id, path = %project.path.display(), "relocated project");
                Ok(RepairOutcome::Relocated(project))
            }
            RepairChoice::Remove => {
                self.mutate(|state| {
                    if !state.is_active(id) {
                        return Err(RegistryError::NotFound(id.to_string()));
                    }
                    state.projects.retain(|p| p.id != id);
                    state.clear_current_if(id);
                    Ok(())
                })
                .await?;
                info!(id, "removed project with unusable path");
                Ok(RepairOutcome::Removed)
            }
            RepairChoice::Dismiss => {
                self.mutate(|state| {
                    if !state.is_active(id) {
                        return Err(RegistryError::NotFound(id.to_string()));
                    }
                    state.clear_current_if(id);
                    Ok(())
                })
                .await?;
                Ok(RepairOutcome::Dismissed)
            }
        }
    }

    pub async fn cycle_prev_project(&self) -> Result<CycleOutcome, RegistryError> {
        self.cycle(CycleDirection::Prev).await
    }

    pub async fn cycle_next_project(&self) -> Result<CycleOutcome, RegistryError> {
        self.cycle(CycleDirection::Next).await
    }

    /// Switch to the nearest project in `direction` whose directory validates
    ///
    /// Candidates with bad paths are skipped silently. History is compacted to
    /// its active entries but never reordered.
    pub async fn cycle(&self, direction: CycleDirection) -> Result<CycleOutcome, RegistryError> {
        let Some(_latch) = Latch::try_acquire(&self.cycling) else {
            debug!(target: "branchyard::history", "cycle already in flight");
            return Ok(CycleOutcome::Busy);
        };

        let plan = {
            let state = self.state();
            plan_cycle(
                &state.history,
                |id| state.is_active(id),
                state.current_project_id.as_deref(),
                direction,
            )
        };
        let Some(plan) = plan else {
            return Ok(CycleOutcome::NoOp);
        };

        for (position, id) in &plan.candidates {
            let Some(project) = self.project(id) else {
                log_skip(id, CycleSkip::NoLongerActive);
                continue;
            };

            let check = check_path(&project.path).await;
            if !check.is_valid() {
                log_skip(id, CycleSkip::InvalidPath(check));
                continue;
            }

            let committed = self
                .mutate(|state| {
                    let project = state
                        .project_mut(id)
                        .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
                    project.last_opened = Utc::now();
                    let project = project.clone();
                    state.current_project_id = Some(id.clone());
                    state.history = plan.valid_history.clone();
                    state.history_index = *position;
                    Ok(project)
                })
                .await;

            match committed {
                Ok(project) => {
                    debug!(target: "branchyard::history", id = %project.id, ?direction, "cycled project");
                    return Ok(CycleOutcome::Switched(project));
                }
                Err(RegistryError::NotFound(_)) => log_skip(id, CycleSkip::NoLongerActive),
                Err(e) => return Err(e),
            }
        }

        warn!(target: "branchyard::history", ?direction, "no valid project to cycle to");
        Ok(CycleOutcome::NoOp)
    }
}

/// Make `id` current and move it to the front of history
fn activate(state: &mut RegistryState, id: &str) -> Result<Project, RegistryError> {
    let project = state
        .project_mut(id)
        .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
    project.last_opened = Utc::now();
    let project = project.clone();

    state.current_project_id = Some(id.to_string());
    state.history.retain(|h| h != id);
    state.history.insert(0, id.to_string());
    state.history_index = 0;
    Ok(project)
}

fn log_skip(id: &str, reason: CycleSkip) {
    debug!(target: "branchyard::history", id, ?reason, "skipped cycle candidate");
}
