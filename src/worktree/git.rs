//! Git worktree commands for branch isolation

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::naming::{normalize_path, resolve_path, sanitize_worktree_name, WORKTREES_DIR};
use super::tracker::BranchTracker;
use crate::model::Worktree;

/// Failure of a single git invocation
#[derive(Error, Debug)]
pub enum GitCommandError {
    #[error("Failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {command} timed out after {timeout_secs}s")]
    TimedOut { command: String, timeout_secs: u64 },

    #[error("git {command} failed: {stderr}")]
    Failed { command: String, stderr: String },
}

#[derive(Error, Debug)]
pub enum WorktreeError {
    #[error("{0} must not be empty")]
    EmptyArgument(&'static str),

    #[error("Not a git repository: {0}")]
    NotARepository(String),

    #[error("Worktree already exists: {0}")]
    WorktreeAlreadyExists(String),

    #[error("Failed to create worktree: {0}")]
    CreationFailed(String),

    #[error("Failed to remove worktree: {0}")]
    RemovalFailed(String),

    #[error(transparent)]
    Git(#[from] GitCommandError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Captured result of a git invocation that ran to completion
#[derive(Debug)]
struct GitOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl GitOutput {
    fn checked(self, args: &[&str]) -> Result<Self, GitCommandError> {
        if self.success {
            Ok(self)
        } else {
            Err(GitCommandError::Failed {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: best_error_line(&self.stderr),
            })
        }
    }
}

/// Run git in `dir`, killing it if it outlives `timeout`
async fn run_git(dir: &Path, args: &[&str], timeout: Duration) -> Result<GitOutput, GitCommandError> {
    let mut command = Command::new("git");
    command
        .current_dir(dir)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(GitCommandError::TimedOut {
                command: args.join(" "),
                timeout_secs: timeout.as_secs(),
            })
        }
    };

    Ok(GitOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Prefer git's `fatal:`/`error:` line over hints and warnings
fn best_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .find(|l| l.starts_with("fatal:") || l.starts_with("error:"))
        .or_else(|| lines.first())
        .map(|l| l.to_string())
        .unwrap_or_else(|| "unknown git error".to_string())
}

/// Top-level directory of the repository containing `dir`
///
/// `Ok(None)` means git answered and `dir` is not inside a repository. Spawn
/// failures and timeouts are errors.
pub async fn repository_root(dir: &Path, timeout: Duration) -> Result<Option<PathBuf>, GitCommandError> {
    let output = run_git(dir, &["rev-parse", "--show-toplevel"], timeout).await?;
    if !output.success {
        debug!(dir = %dir.display(), stderr = %output.stderr.trim(), "not a git repository");
        return Ok(None);
    }
    let root = output.stdout.trim();
    Ok((!root.is_empty()).then(|| PathBuf::from(root)))
}

/// Fail with `NotARepository` unless `repository_path` is a directory inside a repository
async fn require_repository(repository_path: &Path, timeout: Duration) -> Result<(), WorktreeError> {
    let is_dir = tokio::fs::metadata(repository_path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    if !is_dir || repository_root(repository_path, timeout).await?.is_none() {
        return Err(WorktreeError::NotARepository(normalize_path(repository_path)));
    }
    Ok(())
}

/// Outcome of asking git whether a local branch exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchProbe {
    Exists,
    Absent,
    /// git itself could not answer (spawn failure, timeout)
    ToolError(String),
}

impl BranchProbe {
    /// Tool errors count as absence
    pub fn exists(&self) -> bool {
        matches!(self, BranchProbe::Exists)
    }
}

pub async fn probe_branch(repository_path: &Path, branch_name: &str, timeout: Duration) -> BranchProbe {
    let reference = format!("refs/heads/{}", branch_name);
    match run_git(
        repository_path,
        &["rev-parse", "--verify", "--quiet", &reference],
        timeout,
    )
    .await
    {
        Ok(output) if output.success => BranchProbe::Exists,
        Ok(_) => BranchProbe::Absent,
        Err(e) => BranchProbe::ToolError(e.to_string()),
    }
}

/// Worktree directory for a branch: `{repository}/.worktrees/{sanitized-branch}`
pub fn get_worktree_path(repository_path: &Path, branch_name: &str) -> PathBuf {
    repository_path
        .join(WORKTREES_DIR)
        .join(sanitize_worktree_name(branch_name))
}

/// Create a worktree bound to `branch_name`
///
/// Steps run strictly in order: repository probe, `.worktrees` creation,
/// collision check, branch probe, `git worktree add`, ledger write. An existing
/// branch is attached as-is; otherwise the branch is created at `base_branch`
/// (HEAD when `None`) by the same `git worktree add -b` call.
pub async fn create_worktree(
    repository_path: &Path,
    branch_name: &str,
    base_branch: Option<&str>,
    tracker: &BranchTracker,
    timeout: Duration,
) -> Result<Worktree, WorktreeError> {
    if repository_path.as_os_str().is_empty() {
        return Err(WorktreeError::EmptyArgument("repository path"));
    }
    if branch_name.trim().is_empty() {
        return Err(WorktreeError::EmptyArgument("branch name"));
    }

    require_repository(repository_path, timeout).await?;

    let worktree_path = get_worktree_path(repository_path, branch_name);
    let normalized = normalize_path(&worktree_path);

    tokio::fs::create_dir_all(repository_path.join(WORKTREES_DIR)).await?;

    // symlink_metadata so a dangling link at the target still counts as taken
    if tokio::fs::symlink_metadata(&worktree_path).await.is_ok() {
        return Err(WorktreeError::WorktreeAlreadyExists(normalized));
    }

    let probe = probe_branch(repository_path, branch_name, timeout).await;
    if let BranchProbe::ToolError(ref message) = probe {
        warn!(branch = branch_name, error = %message, "branch probe failed, assuming branch is new");
    }
    let branch_exists = probe.exists();

    let target = worktree_path.to_string_lossy().to_string();
    let mut args: Vec<&str> = vec!["worktree", "add"];
    if branch_exists {
        args.push(&target);
        args.push(branch_name);
    } else {
        args.extend(["-b", branch_name, target.as_str()]);
        if let Some(base) = base_branch.filter(|b| !b.trim().is_empty()) {
            args.push(base);
        }
    }

    let output = run_git(repository_path, &args, timeout)
        .await
        .map_err(|e| WorktreeError::CreationFailed(e.to_string()))?;

    if !output.success {
        // Lost a race with another create for the same directory
        if output.stderr.contains("already exists")
            && tokio::fs::symlink_metadata(&worktree_path).await.is_ok()
        {
            return Err(WorktreeError::WorktreeAlreadyExists(normalized));
        }
        return Err(WorktreeError::CreationFailed(best_error_line(&output.stderr)));
    }

    info!(
        worktree = %normalized,
        branch = branch_name,
        is_new = !branch_exists,
        "created worktree"
    );

    // The worktree is on disk at this point; a ledger hiccup must not report failure
    if let Err(e) = tracker.track(repository_path, branch_name).await {
        warn!(branch = branch_name, error = %e, "failed to record branch in ledger");
    }

    Ok(Worktree {
        path: normalized,
        branch: branch_name.to_string(),
        is_new: !branch_exists,
    })
}

/// Remove a worktree directory. The branch and its ledger entry stay.
///
/// The target must be a linked worktree git knows about, or a directory under
/// `{repository}/.worktrees/`. Only the latter is deleted by hand when git
/// refuses to remove it.
pub async fn remove_worktree(
    repository_path: &Path,
    worktree_path: &Path,
    timeout: Duration,
) -> Result<(), WorktreeError> {
    require_repository(repository_path, timeout).await?;

    let display_path = normalize_path(worktree_path);
    let target = resolve_path(worktree_path);
    let managed_dir = resolve_path(repository_path).join(WORKTREES_DIR);
    let managed = target.starts_with(&managed_dir) && target != managed_dir;

    // First entry is the main worktree, never a removal candidate
    let linked = list_worktrees(repository_path, timeout).await?;
    let is_linked = linked
        .iter()
        .skip(1)
        .any(|wt| resolve_path(Path::new(&wt.path)) == target);

    if !managed && !is_linked {
        return Err(WorktreeError::RemovalFailed(format!(
            "{} is not a worktree of {}",
            display_path,
            normalize_path(repository_path)
        )));
    }

    let target_arg = target.to_string_lossy().to_string();
    let refusal = match run_git(
        repository_path,
        &["worktree", "remove", "--force", &target_arg],
        timeout,
    )
    .await
    {
        Ok(output) if output.success => None,
        Ok(output) => Some(best_error_line(&output.stderr)),
        Err(e) => Some(e.to_string()),
    };

    if let Some(reason) = refusal {
        if !managed {
            return Err(WorktreeError::RemovalFailed(format!("{}: {}", display_path, reason)));
        }
        debug!(worktree = %display_path, %reason, "git refused removal, cleaning up directly");
        if tokio::fs::symlink_metadata(&target).await.is_ok() {
            tokio::fs::remove_dir_all(&target)
                .await
                .map_err(|e| WorktreeError::RemovalFailed(format!("{}: {}", display_path, e)))?;
        }
        let prune = ["worktree", "prune"];
        if let Err(e) = run_git(repository_path, &prune, timeout)
            .await
            .and_then(|o| o.checked(&prune))
        {
            warn!(error = %e, "git worktree prune failed");
        }
    }

    info!(worktree = %display_path, "removed worktree");
    Ok(())
}

/// Information about a live worktree as git reports it
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct WorktreeInfo {
    pub path: String,
    /// `None` for a detached HEAD
    pub branch: Option<String>,
    pub head: String,
}

/// List all worktrees git knows about for a repository
pub async fn list_worktrees(
    repository_path: &Path,
    timeout: Duration,
) -> Result<Vec<WorktreeInfo>, WorktreeError> {
    let args = ["worktree", "list", "--porcelain"];
    let output = run_git(repository_path, &args, timeout).await?.checked(&args)?;
    Ok(parse_worktree_list(&output.stdout))
}

fn parse_worktree_list(stdout: &str) -> Vec<WorktreeInfo> {
    let mut worktrees = Vec::new();
    let mut current: Option<WorktreeInfo> = None;

    for line in stdout.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(wt) = current.take() {
                worktrees.push(wt);
            }
            current = Some(WorktreeInfo {
                path: path.replace('\\', "/"),
                branch: None,
                head: String::new(),
            });
        } else if let Some(head) = line.strip_prefix("HEAD ") {
            if let Some(ref mut wt) = current {
                wt.head = head.to_string();
            }
        } else if let Some(branch) = line.strip_prefix("branch ") {
            if let Some(ref mut wt) = current {
                wt.branch = Some(branch.strip_prefix("refs/heads/").unwrap_or(branch).to_string());
            }
        }
    }

    if let Some(wt) = current {
        worktrees.push(wt);
    }

    worktrees
}
