//! Diagnostic tool for git-sw.
//!
//! This module implements the `git-sw doctor` command, which checks the
//! setup for common issues:
//! - Existence of the storage root and the default snapshot.
//! - Profile documents that no longer parse.
//! - Includes pointing at missing profile files, or more than one profile
//!   wired into the same config.
//!
//! It reports issues to the user with a pass/fail/warn status.

use anstyle::AnsiColor;
use std::env;
use std::fs;
use std::path::Path;

use crate::git;
use crate::hasher;
use crate::paths::{DEFAULT_PROFILE_NAME, Paths};
use crate::profiles::read_profile;
use crate::switch::{Scope, Target, profile_includes};
use crate::ui::Ui;

/// Run the doctor diagnostics. Returns `false` if any check failed.
pub fn run_doctor(paths: &Paths, ui: &Ui, cwd: &Path) -> bool {
    ui.section("git-sw Doctor");
    ui.newline();

    let mut healthy = true;

    // 1. Storage
    healthy &= check_step(ui, "Storage", || {
        if paths.storage_root.is_dir() {
            ui.println(format!(
                "  {} Storage directory exists: {}",
                ui.icon_ok(),
                paths.storage_root.display()
            ));
        } else {
            ui.println(format!(
                "  {} Storage directory missing: {}",
                ui.icon_err(),
                paths.storage_root.display()
            ));
            return false;
        }

        if paths.default_config().is_file() {
            ui.println(format!("  {} Default profile snapshot present", ui.icon_ok()));
        } else {
            // recreated on the next run
            ui.println(format!(
                "  {} Default profile snapshot missing",
                ui.icon_warn()
            ));
        }
        true
    });

    // 2. Profiles
    healthy &= check_step(ui, "Profiles", || {
        let entries = match fs::read_dir(&paths.storage_root) {
            Ok(entries) => entries,
            Err(e) => {
                ui.println(format!("  {} Failed to read storage: {}", ui.icon_err(), e));
                return false;
            }
        };

        let default_dir = hasher::dir_name(DEFAULT_PROFILE_NAME);
        let mut all_valid = true;
        let mut found = 0;

        for entry in entries.flatten() {
            let dir = entry.path();
            let Some(dir_name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !dir.is_dir() || dir_name == default_dir {
                continue;
            }

            found += 1;
            match read_profile(&dir, dir_name) {
                Ok(profile) => {
                    let has_identity = profile.config.entries().any(|(key, _)| {
                        key.eq_ignore_ascii_case("user.name")
                            || key.eq_ignore_ascii_case("user.email")
                    });
                    if has_identity {
                        ui.println(format!("    {} {}", ui.icon_ok(), profile.name));
                    } else {
                        // not fatal, git falls back to the outer config
                        ui.println(format!(
                            "    {} {} (sets neither user.name nor user.email)",
                            ui.icon_warn(),
                            profile.name
                        ));
                    }
                }
                Err(e) => {
                    ui.println(format!(
                        "    {} {} ({:#})",
                        ui.icon_err(),
                        dir.display(),
                        e
                    ));
                    all_valid = false;
                }
            }
        }

        if found == 0 {
            ui.println(format!("  {} No profiles found", ui.icon_info()));
        }
        all_valid
    });

    // 3. Includes, per scope
    let mut targets = vec![Target::global(paths)];
    match git::find_local_config(cwd) {
        Ok(Some(local)) => targets.push(Target {
            scope: Scope::Local,
            path: local,
        }),
        Ok(None) => {}
        Err(e) => ui.warn(format!("Could not inspect repository: {e:#}")),
    }

    for target in &targets {
        let title = format!("{} config", target.scope);
        healthy &= check_step(ui, &title, || check_includes(paths, ui, target));
    }

    // 4. Environment
    check_step(ui, "Environment", || {
        match env::var("VISUAL").or_else(|_| env::var("EDITOR")) {
            Ok(e) => ui.println(format!("  {} Editor set to: {}", ui.icon_ok(), e)),
            Err(_) => ui.println(format!(
                "  {} EDITOR not set (using system default)",
                ui.icon_info()
            )),
        }
        true
    });

    healthy
}

fn check_includes(paths: &Paths, ui: &Ui, target: &Target) -> bool {
    let includes = match profile_includes(paths, target) {
        Ok(includes) => includes,
        Err(e) => {
            ui.println(format!(
                "  {} Cannot read {}: {:#}",
                ui.icon_err(),
                target.path.display(),
                e
            ));
            return false;
        }
    };

    let mut ok = true;
    match includes.len() {
        0 => ui.println(format!(
            "  {} No profile wired (default active)",
            ui.icon_info()
        )),
        1 => {}
        n => {
            ui.println(format!(
                "  {} {} profile includes in {}; only the last one applies",
                ui.icon_err(),
                n,
                target.path.display()
            ));
            ok = false;
        }
    }

    for include in &includes {
        if include.resolved.is_file() {
            ui.println(format!("  {} Includes {}", ui.icon_ok(), include.raw));
        } else {
            ui.println(format!(
                "  {} Dangling include: {}",
                ui.icon_err(),
                include.raw
            ));
            ok = false;
        }
    }
    ok
}

fn check_step<F>(ui: &Ui, name: &str, check_fn: F) -> bool
where
    F: FnOnce() -> bool,
{
    ui.println(ui.bold(format!("Checking {}...", name)));
    let success = check_fn();
    if !success {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
    success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitconfig::ConfigDocument;
    use crate::profiles::{create_profile, snapshot_default};
    use crate::switch::activate;
    use crate::test_utils::{outside_repo, setup_test_paths, setup_test_repo};
    use crate::ui::ColorMode;
    use tempfile::TempDir;

    fn test_ui() -> Ui {
        Ui::new(ColorMode::Never, false)
    }

    fn work(paths: &Paths) -> crate::profiles::Profile {
        let mut doc = ConfigDocument::new();
        doc.set("user.name", "Jane Doe").unwrap();
        create_profile(paths, "work", &doc).unwrap()
    }

    #[test]
    fn test_healthy_setup() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        snapshot_default(&paths).unwrap();
        let profile = work(&paths);
        activate(&paths, &Target::global(&paths), &profile.path).unwrap();

        assert!(run_doctor(&paths, &test_ui(), &outside_repo(&temp_dir)));
    }

    #[test]
    fn test_missing_storage() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        assert!(!run_doctor(&paths, &test_ui(), &outside_repo(&temp_dir)));
    }

    #[test]
    fn test_corrupt_profile() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        work(&paths);
        let broken = paths.profile_dir(&hasher::dir_name("broken"));
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join(".gitconfig"), "[user\n").unwrap();

        assert!(!run_doctor(&paths, &test_ui(), &outside_repo(&temp_dir)));
    }

    #[test]
    fn test_dangling_local_include() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let repo = setup_test_repo(&temp_dir);
        let profile = work(&paths);
        let target = Target::resolve(&paths, Scope::Local, &repo).unwrap();
        activate(&paths, &target, &profile.path).unwrap();
        assert!(run_doctor(&paths, &test_ui(), &repo));

        fs::remove_dir_all(paths.profile_dir(&profile.dir_name)).unwrap();
        assert!(!run_doctor(&paths, &test_ui(), &repo));
    }

    #[test]
    fn test_multiple_includes() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let profile = work(&paths);
        fs::create_dir_all(&paths.home_dir).unwrap();
        fs::write(
            &paths.global_config,
            format!(
                "[include]\n\tpath = {0}\n[include]\n\tpath = {0}\n",
                profile.path.display()
            ),
        )
        .unwrap();

        assert!(!run_doctor(&paths, &test_ui(), &outside_repo(&temp_dir)));
    }
}
