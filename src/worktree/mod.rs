//! Git worktree management for parallel branches
//!
//! Each branch gets its own checkout under `{repository}/.worktrees/`, so several
//! branches of one repository can be worked on side by side. Branches created
//! here are recorded in a ledger that outlives the worktree directories.
//!
//! Project configuration is never linked or copied into a worktree; callers
//! resolve it from the primary repository path.

pub mod git;
mod naming;
mod tracker;

pub use git::{create_worktree, list_worktrees, remove_worktree};
pub use naming::normalize_path;
pub use tracker::BranchTracker;
