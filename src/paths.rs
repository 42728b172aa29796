use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::{Path, PathBuf};

use crate::error::GitswError;
use crate::hasher;

/// Directory name of the storage root inside the user config directory
pub const TOOL_DIR_NAME: &str = "git-sw";
/// File name of every stored profile document
pub const PROFILE_FILE_NAME: &str = ".gitconfig";
/// Reserved name of the default pseudo-profile
pub const DEFAULT_PROFILE_NAME: &str = "default";
/// Overrides the storage root when set
pub const STORAGE_DIR_ENV: &str = "GIT_SW_DIR";

/// All computed paths used by git-sw
#[derive(Debug, Clone)]
pub struct Paths {
    /// ~
    pub home_dir: PathBuf,
    /// ~/.gitconfig
    pub global_config: PathBuf,
    /// <config dir>/git-sw, or $GIT_SW_DIR
    pub storage_root: PathBuf,
}

impl Paths {
    pub fn new() -> Result<Self> {
        let base_dirs = BaseDirs::new().ok_or(GitswError::HomeDirNotFound)?;
        let home_dir = base_dirs.home_dir().to_path_buf();

        let storage_root = match std::env::var_os(STORAGE_DIR_ENV) {
            // includes are written as absolute paths, so the root must be one
            Some(dir) if !dir.is_empty() => std::path::absolute(&dir).with_context(|| {
                format!("Invalid {STORAGE_DIR_ENV}: {}", Path::new(&dir).display())
            })?,
            _ => base_dirs.config_dir().join(TOOL_DIR_NAME),
        };

        Ok(Self {
            global_config: home_dir.join(".gitconfig"),
            home_dir,
            storage_root,
        })
    }

    /// Get the path to a specific profile directory
    pub fn profile_dir(&self, dir_name: &str) -> PathBuf {
        self.storage_root.join(dir_name)
    }

    /// Get the path to a specific profile's config document
    pub fn profile_config(&self, dir_name: &str) -> PathBuf {
        self.profile_dir(dir_name).join(PROFILE_FILE_NAME)
    }

    /// Directory holding the snapshot of the user's original global config
    pub fn default_dir(&self) -> PathBuf {
        self.profile_dir(&hasher::dir_name(DEFAULT_PROFILE_NAME))
    }

    pub fn default_config(&self) -> PathBuf {
        self.default_dir().join(PROFILE_FILE_NAME)
    }

    /// Check if a path is within the storage root
    pub fn is_in_storage(&self, path: &Path) -> bool {
        path.starts_with(&self.storage_root)
    }

    /// Ensure the storage root exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.storage_root).with_context(|| {
            format!(
                "Failed to create storage directory: {}",
                self.storage_root.display()
            )
        })
    }
}
