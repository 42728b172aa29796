//! Profile store.
//!
//! This module handles the "data model" of profiles:
//! - Creating and removing profiles
//! - Listing available profiles
//! - Snapshotting the user's global config as the default profile
//!
//! Each profile lives in `<storage root>/<hash of name>/.gitconfig`. Since the
//! directory name is a one-way hash, the display name is kept inside the
//! document itself under `gitsw.name`.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::GitswError;
use crate::fs_utils::normalize_path;
use crate::gitconfig::ConfigDocument;
use crate::hasher;
use crate::paths::{DEFAULT_PROFILE_NAME, PROFILE_FILE_NAME, Paths};

/// Config key holding a profile's display name
pub const NAME_KEY: &str = "gitsw.name";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub name: String,
    pub dir_name: String,
    /// The profile's config document on disk
    pub path: PathBuf,
    #[serde(skip)]
    pub config: ConfigDocument,
    /// Derived from the target config's includes, never stored
    #[serde(rename = "active")]
    pub is_active: bool,
}

impl Profile {
    pub fn is_default(&self) -> bool {
        self.dir_name == hasher::dir_name(DEFAULT_PROFILE_NAME)
    }

    /// The default pseudo-profile. Its document is the user's own global
    /// config and is never parsed, so `config` stays empty.
    pub fn default_profile(paths: &Paths) -> Self {
        Self {
            name: DEFAULT_PROFILE_NAME.to_string(),
            dir_name: hasher::dir_name(DEFAULT_PROFILE_NAME),
            path: paths.default_config(),
            config: ConfigDocument::new(),
            is_active: false,
        }
    }
}

/// List available profiles, default first.
///
/// `active` is the resolved include path currently wired into the target
/// config; `None` means no profile is wired and the default is active.
/// Directories whose document cannot be read are skipped with a warning.
pub fn list_profiles(paths: &Paths, active: Option<&Path>) -> Result<Vec<Profile>> {
    paths.ensure_dirs()?;

    let mut profiles = Vec::new();
    let default = Profile::default_profile(paths);

    for entry in fs::read_dir(&paths.storage_root).with_context(|| {
        format!(
            "Failed to read storage directory: {}",
            paths.storage_root.display()
        )
    })? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if dir_name == default.dir_name {
            continue;
        }

        match read_profile(&path, dir_name) {
            Ok(profile) => profiles.push(profile),
            Err(e) => tracing::warn!(
                dir = %path.display(),
                error = %format!("{e:#}"),
                "skipping unreadable profile"
            ),
        }
    }

    profiles.sort_by_key(|p| hasher::normalize(&p.name));
    profiles.insert(0, default);

    let active = active.map(normalize_path);
    for profile in &mut profiles {
        profile.is_active = match &active {
            Some(active) => *active == normalize_path(&profile.path),
            None => profile.is_default(),
        };
    }

    Ok(profiles)
}

pub(crate) fn read_profile(dir: &Path, dir_name: &str) -> Result<Profile> {
    let path = dir.join(PROFILE_FILE_NAME);
    let config = ConfigDocument::read(&path)?;

    let name = config
        .get(NAME_KEY)
        .with_context(|| format!("Missing {NAME_KEY} in {}", path.display()))?
        .to_string();
    if hasher::dir_name(&name) != dir_name {
        bail!(
            "Profile name '{}' does not match its directory {}",
            name,
            dir.display()
        );
    }

    Ok(Profile {
        name,
        dir_name: dir_name.to_string(),
        path,
        config,
        is_active: false,
    })
}

/// Find a profile by case-insensitive name
pub fn find_profile<'a>(profiles: &'a [Profile], name: &str) -> Option<&'a Profile> {
    profiles.iter().find(|p| hasher::same_name(&p.name, name))
}

/// Create a new profile from an already validated document.
///
/// Fails on a duplicate (case-insensitive) or reserved name, and when the
/// hashed directory already exists. The directory is created before the
/// document is written; if that write fails the directory is left behind
/// for the caller to remove.
pub fn create_profile(paths: &Paths, name: &str, config: &ConfigDocument) -> Result<Profile> {
    if hasher::same_name(name, DEFAULT_PROFILE_NAME) {
        bail!(GitswError::ReservedProfileName(name.to_string()));
    }
    let existing = list_profiles(paths, None)?;
    if find_profile(&existing, name).is_some() {
        bail!(GitswError::DuplicateProfile(name.to_string()));
    }

    let dir_name = hasher::dir_name(name);
    let dir = paths.profile_dir(&dir_name);
    if dir.exists() {
        bail!(GitswError::HashCollision {
            name: name.to_string(),
            dir,
        });
    }

    let mut config = config.clone();
    config.set(NAME_KEY, name)?;

    let path = populate_new_dir(&dir, |dir| {
        let path = dir.join(PROFILE_FILE_NAME);
        config.write(&path)?;
        Ok(path)
    })?;

    tracing::debug!(profile = name, dir = %dir.display(), "created profile");

    Ok(Profile {
        name: name.to_string(),
        dir_name,
        path,
        config,
        is_active: false,
    })
}

/// Create `dir` and fill it. If `fill` fails the directory is removed
/// again, so no half-written profile is left behind.
fn populate_new_dir<T>(dir: &Path, fill: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create profile directory: {}", dir.display()))?;

    fill(dir).inspect_err(|_| {
        if let Err(cleanup) = fs::remove_dir_all(dir) {
            tracing::warn!(dir = %dir.display(), error = %cleanup, "failed to clean up");
        }
    })
}

/// Remove a profile's storage directory.
///
/// Callers must retract every include referencing the profile first.
pub fn remove_profile(paths: &Paths, profile: &Profile) -> Result<()> {
    let profile_dir = paths.profile_dir(&profile.dir_name);

    if !profile_dir.exists() {
        bail!(GitswError::ProfileNotFound(profile.name.clone()));
    }

    fs::remove_dir_all(&profile_dir).with_context(|| {
        format!(
            "Failed to remove profile directory: {}",
            profile_dir.display()
        )
    })?;

    tracing::debug!(profile = %profile.name, "removed profile");
    Ok(())
}

/// Copy the user's global config into the default profile's slot, once.
///
/// Returns `true` when a snapshot was taken. An empty file stands in for a
/// missing global config.
pub fn snapshot_default(paths: &Paths) -> Result<bool> {
    let target = paths.default_config();
    if target.exists() {
        return Ok(false);
    }

    let dir = paths.default_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    if paths.global_config.is_file() {
        fs::copy(&paths.global_config, &target).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                paths.global_config.display(),
                target.display()
            )
        })?;
    } else {
        fs::write(&target, "")
            .with_context(|| format!("Failed to create {}", target.display()))?;
    }

    tracing::info!(snapshot = %target.display(), "saved default profile");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_paths;
    use tempfile::TempDir;

    fn doc(name: &str, email: &str) -> ConfigDocument {
        let mut doc = ConfigDocument::new();
        doc.set("user.name", name).unwrap();
        doc.set("user.email", email).unwrap();
        doc
    }

    #[test]
    fn test_failed_fill_removes_new_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let dir = paths.profile_dir(&hasher::dir_name("work"));

        let err = populate_new_dir(&dir, |dir| -> Result<()> {
            fs::write(dir.join(PROFILE_FILE_NAME), "[user]\n")?;
            bail!("No space left on device")
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "No space left on device");
        assert!(!dir.exists());
        assert!(paths.storage_root.is_dir());
        let names: Vec<_> = list_profiles(&paths, None)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["default"]);
    }

    #[test]
    fn test_list_empty_store_has_default() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);

        let profiles = list_profiles(&paths, None).unwrap();
        assert_eq!(profiles.len(), 1);
        assert!(profiles[0].is_default());
        assert!(profiles[0].is_active);
    }

    #[test]
    fn test_create_profile_writes_document() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);

        let profile = create_profile(&paths, "work", &doc("Jane Doe", "jane@example.com")).unwrap();

        assert_eq!(profile.dir_name, hasher::dir_name("work"));
        let stored = ConfigDocument::read(&profile.path).unwrap();
        assert_eq!(stored.get("user.name"), Some("Jane Doe"));
        assert_eq!(stored.get("user.email"), Some("jane@example.com"));
        assert_eq!(stored.get(NAME_KEY), Some("work"));

        let profiles = list_profiles(&paths, None).unwrap();
        let matches: Vec<_> = profiles.iter().filter(|p| p.name == "work").collect();
        assert_eq!(matches.len(), 1);
        assert!(!matches[0].is_active);
    }

    #[test]
    fn test_create_duplicate_any_case() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        create_profile(&paths, "Work", &doc("Jane", "jane@example.com")).unwrap();
        let before = fs::read_dir(&paths.storage_root).unwrap().count();

        let err = create_profile(&paths, "wORK", &doc("Other", "o@example.com")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitswError>(),
            Some(GitswError::DuplicateProfile(_))
        ));
        assert_eq!(fs::read_dir(&paths.storage_root).unwrap().count(), before);

        let stored = ConfigDocument::read(&paths.profile_config(&hasher::dir_name("work"))).unwrap();
        assert_eq!(stored.get("user.name"), Some("Jane"));
    }

    #[test]
    fn test_create_reserved_name() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let err = create_profile(&paths, "DEFAULT", &ConfigDocument::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitswError>(),
            Some(GitswError::ReservedProfileName(_))
        ));
    }

    #[test]
    fn test_existing_directory_is_collision() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        // a directory for "work" exists but holds no readable profile
        fs::create_dir_all(paths.profile_dir(&hasher::dir_name("work"))).unwrap();

        let err = create_profile(&paths, "work", &ConfigDocument::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitswError>(),
            Some(GitswError::HashCollision { .. })
        ));
    }

    #[test]
    fn test_corrupt_profile_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        create_profile(&paths, "work", &doc("Jane", "jane@example.com")).unwrap();
        let personal = create_profile(&paths, "personal", &doc("J", "j@example.com")).unwrap();
        fs::write(&personal.path, "[user\n").unwrap();

        let names: Vec<String> = list_profiles(&paths, None)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["default", "work"]);
    }

    #[test]
    fn test_list_marks_active() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let work = create_profile(&paths, "work", &doc("Jane", "jane@example.com")).unwrap();
        create_profile(&paths, "personal", &doc("J", "j@example.com")).unwrap();

        let profiles = list_profiles(&paths, Some(&work.path)).unwrap();
        let active: Vec<&str> = profiles
            .iter()
            .filter(|p| p.is_active)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(active, ["work"]);
    }

    #[test]
    fn test_remove_profile() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let work = create_profile(&paths, "work", &doc("Jane", "jane@example.com")).unwrap();

        remove_profile(&paths, &work).unwrap();
        assert!(!paths.profile_dir(&work.dir_name).exists());

        let err = remove_profile(&paths, &work).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitswError>(),
            Some(GitswError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_snapshot_default_once() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        fs::create_dir_all(&paths.home_dir).unwrap();
        fs::write(&paths.global_config, "[user]\n\tname = Base\n").unwrap();

        assert!(snapshot_default(&paths).unwrap());
        assert_eq!(
            fs::read_to_string(paths.default_config()).unwrap(),
            "[user]\n\tname = Base\n"
        );

        fs::write(&paths.global_config, "[user]\n\tname = Changed\n").unwrap();
        assert!(!snapshot_default(&paths).unwrap());
        assert_eq!(
            fs::read_to_string(paths.default_config()).unwrap(),
            "[user]\n\tname = Base\n"
        );
    }

    #[test]
    fn test_snapshot_without_global_config() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        assert!(snapshot_default(&paths).unwrap());
        assert_eq!(fs::read_to_string(paths.default_config()).unwrap(), "");
    }
}
