//! Repository discovery for the local scope.
//!
//! Walks up from a directory looking for `.git` the way git does, without
//! spawning git itself.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fs_utils::normalize_path;

/// Find the config file of the repository containing `start`.
///
/// Returns `None` when `start` is not inside a repository. `start` should be
/// absolute.
pub fn find_local_config(start: &Path) -> Result<Option<PathBuf>> {
    for dir in start.ancestors() {
        let dot_git = dir.join(".git");
        if dot_git.is_dir() {
            return Ok(Some(common_dir(&dot_git)?.join("config")));
        }
        // Worktrees and submodules: `.git` is a file pointing elsewhere
        if dot_git.is_file() {
            let git_dir = read_gitdir_file(&dot_git)?;
            return Ok(Some(common_dir(&git_dir)?.join("config")));
        }
    }
    Ok(None)
}

fn read_gitdir_file(path: &Path) -> Result<PathBuf> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let target = content
        .lines()
        .find_map(|line| line.strip_prefix("gitdir:"))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("Invalid .git file: {}", path.display()))?;

    Ok(resolve_relative(path.parent().unwrap_or(Path::new("/")), target))
}

/// A linked worktree keeps its config in the main repository, named by the
/// `commondir` file.
fn common_dir(git_dir: &Path) -> Result<PathBuf> {
    let commondir = git_dir.join("commondir");
    if !commondir.is_file() {
        return Ok(git_dir.to_path_buf());
    }

    let content = fs::read_to_string(&commondir)
        .with_context(|| format!("Failed to read {}", commondir.display()))?;
    Ok(resolve_relative(git_dir, content.trim()))
}

fn resolve_relative(base: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        target.to_path_buf()
    } else {
        normalize_path(&base.join(target))
    }
}
