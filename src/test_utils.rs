//! Fixtures shared by the unit tests: a fake home, a fake repository, and a
//! directory known to be outside any repository.

use crate::paths::Paths;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a Paths struct for testing using a temporary directory
///
/// This mimics the real layout inside the temp directory: `home/.gitconfig`
/// and `home/.config/git-sw/`.
pub fn setup_test_paths(temp_dir: &TempDir) -> Paths {
    let home_dir = temp_dir.path().join("home");
    Paths {
        global_config: home_dir.join(".gitconfig"),
        storage_root: home_dir.join(".config/git-sw"),
        home_dir,
    }
}

/// Create a fake repository (`<temp>/repo/.git/config`) and return its work tree
pub fn setup_test_repo(temp_dir: &TempDir) -> PathBuf {
    let repo = temp_dir.path().join("repo");
    fs::create_dir_all(repo.join(".git")).unwrap();
    fs::write(
        repo.join(".git/config"),
        "[core]\n\trepositoryformatversion = 0\n\tbare = false\n",
    )
    .unwrap();
    repo
}

/// A directory guaranteed not to be inside any repository
pub fn outside_repo(temp_dir: &TempDir) -> PathBuf {
    let dir = temp_dir.path().join("outside");
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Read a file, returning an empty string when it does not exist
pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}
