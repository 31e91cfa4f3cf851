use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;

pub const USAGE: &str = "\
usage: branchyard <command> [args]

projects:
  add <path> [name]            register a project directory
  open <id>                    make a project current
  list                         show projects, trash and history
  validate <id>                check a project's directory
  prev | next                  cycle through visit history
  trash <id>                   move a project to the in-app trash
  restore <id>                 restore a trashed project
  delete-from-disk <id>        send a trashed project's directory to the system trash
  empty-trash                  forget every trashed project
  relocate <id> <path>         point a project at a new directory
  remove <id>                  remove a project whose directory is unusable
  dismiss <id>                 stop using a broken project as current

worktrees:
  worktree create <repo> <branch> [base]
  worktree remove <repo> <worktree-path>
  worktree list <repo>
  branches <repo>              branches created through branchyard, newest first
  track <repo> <branch>
  untrack <repo> <branch>";

/// Requests the core understands (one per CLI subcommand)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // Project registry
    AddProject { path: PathBuf, name: Option<String> },
    OpenProject(String),
    ListProjects,
    ValidateProjectPath(String),
    CyclePrevProject,
    CycleNextProject,

    // Trash
    TrashProject(String),
    RestoreTrashedProject(String),
    DeleteTrashedProjectFromDisk(String),
    EmptyTrash,

    // Path repair
    RelocateProject { id: String, path: PathBuf },
    RemoveProject(String),
    DismissProject(String),

    // Worktrees
    CreateWorktree {
        repository: PathBuf,
        branch: String,
        base: Option<String>,
    },
    RemoveWorktree { repository: PathBuf, worktree: PathBuf },
    ListWorktrees(PathBuf),

    // Branch ledger
    ListTrackedBranches(PathBuf),
    TrackBranch { repository: PathBuf, branch: String },
    UntrackBranch { repository: PathBuf, branch: String },
}

impl Message {
    /// Parse command-line arguments (without the program name)
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut it = args.iter().map(String::as_str);
        let command = it.next().ok_or_else(|| anyhow!("missing command"))?;
        let mut arg = |what: &str| {
            it.next()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("`{}` needs <{}>", command, what))
        };

        let message = match command {
            "add" => Message::AddProject {
                path: PathBuf::from(arg("path")?),
                name: arg("name").ok(),
            },
            "open" => Message::OpenProject(arg("id")?),
            "list" => Message::ListProjects,
            "validate" => Message::ValidateProjectPath(arg("id")?),
            "prev" => Message::CyclePrevProject,
            "next" => Message::CycleNextProject,
            "trash" => Message::TrashProject(arg("id")?),
            "restore" => Message::RestoreTrashedProject(arg("id")?),
            "delete-from-disk" => Message::DeleteTrashedProjectFromDisk(arg("id")?),
            "empty-trash" => Message::EmptyTrash,
            "relocate" => Message::RelocateProject {
                id: arg("id")?,
                path: PathBuf::from(arg("path")?),
            },
            "remove" => Message::RemoveProject(arg("id")?),
            "dismiss" => Message::DismissProject(arg("id")?),
            "worktree" => match arg("create|remove|list")?.as_str() {
                "create" => Message::CreateWorktree {
                    repository: PathBuf::from(arg("repo")?),
                    branch: arg("branch")?,
                    base: arg("base").ok(),
                },
                "remove" => Message::RemoveWorktree {
                    repository: PathBuf::from(arg("repo")?),
                    worktree: PathBuf::from(arg("worktree-path")?),
                },
                "list" => Message::ListWorktrees(PathBuf::from(arg("repo")?)),
                other => bail!("unknown worktree command `{}`", other),
            },
            "branches" => Message::ListTrackedBranches(PathBuf::from(arg("repo")?)),
            "track" => Message::TrackBranch {
                repository: PathBuf::from(arg("repo")?),
                branch: arg("branch")?,
            },
            "untrack" => Message::UntrackBranch {
                repository: PathBuf::from(arg("repo")?),
                branch: arg("branch")?,
            },
            other => bail!("unknown command `{}`", other),
        };

        if let Some(extra) = it.next() {
            bail!("unexpected argument `{}`", extra);
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Message> {
        let args: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        Message::from_args(&args)
    }

    #[test]
    fn test_parse_project_commands() {
        assert_eq!(
            parse("add /work/app").unwrap(),
            Message::AddProject {
                path: PathBuf::from("/work/app"),
                name: None
            }
        );
        assert_eq!(parse("prev").unwrap(), Message::CyclePrevProject);
        assert_eq!(parse("empty-trash").unwrap(), Message::EmptyTrash);
        assert_eq!(
            parse("relocate abc /new/place").unwrap(),
            Message::RelocateProject {
                id: "abc".to_string(),
                path: PathBuf::from("/new/place")
            }
        );
    }

    #[test]
    fn test_parse_worktree_create_with_optional_base() {
        assert_eq!(
            parse("worktree create /repo feature/x").unwrap(),
            Message::CreateWorktree {
                repository: PathBuf::from("/repo"),
                branch: "feature/x".to_string(),
                base: None
            }
        );
        assert_eq!(
            parse("worktree create /repo feature/x main").unwrap(),
            Message::CreateWorktree {
                repository: PathBuf::from("/repo"),
                branch: "feature/x".to_string(),
                base: Some("main".to_string())
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("open").is_err());
        assert!(parse("frobnicate").is_err());
        assert!(parse("worktree explode /repo").is_err());
        assert!(parse("list extra").is_err());
    }
}
