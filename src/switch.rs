//! Profile switching logic.
//!
//! This module implements the core mechanism of git-sw: wiring one profile's
//! document into a target git config through an `[include] path = ...`
//! entry, and retracting it again.
//!
//! Which profile is active is never stored anywhere. It is read back from
//! the target config each time: the last include that resolves to a file
//! under the storage root wins, and no such include means the default
//! profile is active.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::error::GitswError;
use crate::fs_utils::{normalize_path, read_or_empty, write_atomic};
use crate::gitconfig::{ParsedLine, escape_value, is_continued, parse_line, validate_value};
use crate::git;
use crate::paths::Paths;
use crate::profiles::Profile;

/// Where a profile is activated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The user-level config, `~/.gitconfig`
    Global,
    /// The config of the repository containing the working directory
    Local,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Local => f.write_str("local"),
        }
    }
}

/// A resolved target config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scope: Scope,
    pub path: PathBuf,
}

impl Target {
    pub fn global(paths: &Paths) -> Self {
        Self {
            scope: Scope::Global,
            path: paths.global_config.clone(),
        }
    }

    /// Resolve `scope` to a file. Local scope outside a repository fails
    /// with `NotGitDirectory` without touching anything.
    pub fn resolve(paths: &Paths, scope: Scope, cwd: &Path) -> Result<Self> {
        match scope {
            Scope::Global => Ok(Self::global(paths)),
            Scope::Local => {
                let path = git::find_local_config(cwd)?.ok_or(GitswError::NotGitDirectory)?;
                Ok(Self { scope, path })
            }
        }
    }
}

/// Which includes a retraction applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeMatch<'a> {
    /// Any include pointing under the storage root
    AnyProfile,
    /// Only includes pointing into this profile directory
    Profile(&'a str),
}

impl IncludeMatch<'_> {
    /// `resolved` must already be normalized.
    fn matches(&self, storage_root: &Path, resolved: &Path) -> bool {
        let Ok(rest) = resolved.strip_prefix(storage_root) else {
            return false;
        };
        let Some(first) = rest.components().next() else {
            return false;
        };
        match self {
            IncludeMatch::AnyProfile => true,
            IncludeMatch::Profile(dir_name) => first.as_os_str() == *dir_name,
        }
    }
}

/// An `include.path` entry found in a target config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Include {
    /// Index of the line holding the entry
    line: usize,
    /// Section header the entry belongs to
    header: usize,
    /// The value as written
    pub raw: String,
    /// The value resolved to a normalized absolute path
    pub resolved: PathBuf,
}

/// Line-preserving view of a target config file.
///
/// Only `[include]` entries are ever added or removed; every other line is
/// written back exactly as read.
struct TargetFile {
    path: PathBuf,
    lines: Vec<String>,
    trailing_newline: bool,
}

impl TargetFile {
    fn load(path: &Path) -> Result<Self> {
        let content = read_or_empty(path)?;
        let trailing_newline = content.is_empty() || content.ends_with('\n');
        let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
        if trailing_newline {
            lines.pop();
        }
        Ok(Self {
            path: path.to_path_buf(),
            lines,
            trailing_newline,
        })
    }

    fn save(&self) -> Result<()> {
        let mut content = self.lines.join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            content.push('\n');
        }
        write_atomic(&self.path, &content)
    }

    fn includes(&self, paths: &Paths) -> Result<Vec<Include>> {
        let mut includes = Vec::new();
        let mut header: Option<(usize, bool)> = None;
        let mut continued = false;

        for (idx, line) in self.lines.iter().enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line.as_str());
            // multi-line values are never ours; skip them whole
            let was_continued = continued;
            continued = is_continued(line);
            if was_continued || continued {
                continue;
            }

            let parsed = parse_line(line).map_err(|message| GitswError::Parse {
                path: self.path.clone(),
                line: idx + 1,
                message,
            })?;

            match parsed {
                ParsedLine::Blank => {}
                ParsedLine::Section {
                    name,
                    subsection,
                    entry,
                } => {
                    let is_include = name.eq_ignore_ascii_case("include") && subsection.is_none();
                    header = Some((idx, is_include));
                    if let Some((name, value)) = entry {
                        includes.extend(self.include_entry(paths, header, idx, &name, value));
                    }
                }
                ParsedLine::Entry { name, value } => {
                    includes.extend(self.include_entry(paths, header, idx, &name, value));
                }
            }
        }

        Ok(includes)
    }

    /// An entry at line `idx` is an include if it is `path` inside `[include]`.
    fn include_entry(
        &self,
        paths: &Paths,
        header: Option<(usize, bool)>,
        idx: usize,
        name: &str,
        value: Option<String>,
    ) -> Option<Include> {
        let Some((header_idx, true)) = header else {
            return None;
        };
        let value = value?;
        if !name.eq_ignore_ascii_case("path") {
            return None;
        }
        Some(Include {
            line: idx,
            header: header_idx,
            resolved: self.resolve(paths, &value),
            raw: value,
        })
    }

    /// Resolve an include value the way git does: `~/` is the home
    /// directory and relative paths are relative to the including file.
    fn resolve(&self, paths: &Paths, value: &str) -> PathBuf {
        let path = if value == "~" {
            paths.home_dir.clone()
        } else if let Some(rest) = value.strip_prefix("~/") {
            paths.home_dir.join(rest)
        } else {
            PathBuf::from(value)
        };

        let path = if path.is_absolute() {
            path
        } else {
            self.path.parent().unwrap_or(Path::new("/")).join(path)
        };
        normalize_path(&path)
    }

    /// Remove matching includes, plus any `[include]` header they leave
    /// empty. Returns the number of includes removed.
    fn remove_includes(&mut self, paths: &Paths, matcher: IncludeMatch<'_>) -> Result<usize> {
        let storage_root = normalize_path(&paths.storage_root);
        let doomed: Vec<Include> = self
            .includes(paths)?
            .into_iter()
            .filter(|inc| matcher.matches(&storage_root, &inc.resolved))
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        // `[include] path = x` keeps its header, the rest of the line goes
        for inc in doomed.iter().filter(|inc| inc.line == inc.header) {
            let line = &self.lines[inc.line];
            let Some(end) = line.find(']') else {
                continue;
            };
            let cr = if line.ends_with('\r') { "\r" } else { "" };
            let header_only = format!("{}{cr}", &line[..=end]);
            self.lines[inc.line] = header_only;
        }

        let mut remove: Vec<usize> = doomed
            .iter()
            .filter(|inc| inc.line != inc.header)
            .map(|inc| inc.line)
            .collect();
        for header in doomed.iter().map(|inc| inc.header) {
            if self.section_is_empty_without(header, &remove) {
                remove.push(header);
            }
        }

        remove.sort_unstable();
        remove.dedup();
        for idx in remove.into_iter().rev() {
            self.lines.remove(idx);
        }

        Ok(doomed.len())
    }

    /// True if the section starting at `header` holds nothing but blank
    /// lines once the lines in `removed` are gone.
    fn section_is_empty_without(&self, header: usize, removed: &[usize]) -> bool {
        let header_line = self.lines[header].trim_end_matches('\r');
        if !matches!(
            parse_line(header_line),
            Ok(ParsedLine::Section { entry: None, .. })
        ) {
            return false;
        }
        self.lines
            .iter()
            .enumerate()
            .skip(header + 1)
            .take_while(|(_, line)| !line.trim_start().starts_with('['))
            .filter(|(idx, _)| !removed.contains(idx))
            .all(|(_, line)| line.trim().is_empty())
    }

    /// Append a new `[include]` section at the end of the file, so the
    /// profile overrides anything set earlier in the same file.
    fn append_include(&mut self, include: &Path) -> Result<()> {
        let value = include
            .to_str()
            .with_context(|| format!("Path is not valid UTF-8: {}", include.display()))?;
        validate_value(value)?;

        // a trailing backslash would pull the header into the previous value
        if self
            .lines
            .last()
            .is_some_and(|line| is_continued(line.trim_end_matches('\r')))
        {
            self.lines.push(String::new());
        }
        self.lines.push("[include]".to_string());
        self.lines.push(format!("\tpath = {}", escape_value(value)));
        self.trailing_newline = true;
        Ok(())
    }
}

/// All includes in `target` that point under the storage root, in file order.
pub fn profile_includes(paths: &Paths, target: &Target) -> Result<Vec<Include>> {
    if !target.path.exists() {
        return Ok(Vec::new());
    }
    let storage_root = normalize_path(&paths.storage_root);
    Ok(TargetFile::load(&target.path)?
        .includes(paths)?
        .into_iter()
        .filter(|inc| IncludeMatch::AnyProfile.matches(&storage_root, &inc.resolved))
        .collect())
}

/// The profile document currently wired into `target`, if any.
pub fn active_include(paths: &Paths, target: &Target) -> Result<Option<PathBuf>> {
    Ok(profile_includes(paths, target)?
        .pop()
        .map(|inc| inc.resolved))
}

/// Whether `profile` is the one active in `target`
pub fn is_active(paths: &Paths, target: &Target, profile: &Profile) -> Result<bool> {
    Ok(match active_include(paths, target)? {
        Some(active) => active == normalize_path(&profile.path),
        None => profile.is_default(),
    })
}

/// The include that decides the identity seen from `cwd`: the repository's
/// own config first, then the global one.
pub fn effective_include(paths: &Paths, cwd: &Path) -> Result<Option<PathBuf>> {
    if let Some(local) = git::find_local_config(cwd)? {
        let target = Target {
            scope: Scope::Local,
            path: local,
        };
        if let Some(active) = active_include(paths, &target)? {
            return Ok(Some(active));
        }
    }
    active_include(paths, &Target::global(paths))
}

/// Retract includes selected by `matcher` from `target`.
///
/// A missing target file or no matching include is a no-op. Returns the
/// number of includes removed.
pub fn retract(paths: &Paths, target: &Target, matcher: IncludeMatch<'_>) -> Result<usize> {
    if !target.path.exists() {
        return Ok(0);
    }

    let mut file = TargetFile::load(&target.path)?;
    let removed = file.remove_includes(paths, matcher)?;
    if removed > 0 {
        file.save()
            .with_context(|| format!("Failed to update {}", target.path.display()))?;
        tracing::debug!(target = %target.path.display(), removed, "retracted includes");
    }
    Ok(removed)
}

/// Remove every profile include from `target`, restoring the default.
pub fn deactivate(paths: &Paths, target: &Target) -> Result<usize> {
    retract(paths, target, IncludeMatch::AnyProfile)
}

/// Wire `profile_config` into `target`, replacing any active profile.
///
/// The old include is retracted and saved before the new one is added; if
/// the second write fails the scope is left with no profile active rather
/// than pointing at a stale one.
pub fn activate(paths: &Paths, target: &Target, profile_config: &Path) -> Result<()> {
    if !profile_config.is_file() {
        bail!(GitswError::ProfileNotFound(profile_config.display().to_string()));
    }
    if !paths.is_in_storage(profile_config) {
        bail!(
            "Refusing to include a file outside {}: {}",
            paths.storage_root.display(),
            profile_config.display()
        );
    }

    deactivate(paths, target)?;

    let mut file = TargetFile::load(&target.path)?;
    file.append_include(profile_config)?;
    file.save().with_context(|| {
        format!(
            "Failed to write include into {}",
            target.path.display()
        )
    })?;

    tracing::debug!(
        target = %target.path.display(),
        include = %profile_config.display(),
        "activated profile"
    );
    Ok(())
}
