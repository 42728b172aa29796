//! High-level command orchestration for the CLI.
//!
//! This module contains the handler functions for each CLI command (`create`,
//! `use`, `list`, etc.). It serves as the coordination layer, interacting with:
//! - `crate::input` for gathering profile data and selections.
//! - `crate::ui` for output.
//! - `crate::profiles` for the profile store.
//! - `crate::switch` for wiring profiles into git configs.
//!
//! Each function here generally corresponds to a subcommand in `main.rs`.
//! Ordering matters: validation runs before any write, and includes are
//! retracted before the storage they point at is removed.

use anstyle::AnsiColor;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use std::fs;
use std::path::Path;

use crate::doctor::run_doctor;
use crate::error::GitswError;
use crate::git;
use crate::hasher;
use crate::input::{ProfileInput, choose_profile};
use crate::paths::{DEFAULT_PROFILE_NAME, Paths};
use crate::profiles::{Profile, create_profile, list_profiles, remove_profile};
use crate::switch::{
    IncludeMatch, Scope, Target, activate, active_include, deactivate, effective_include, retract,
};
use crate::ui::Ui;

/// Create a new profile
pub fn create(paths: &Paths, ui: &Ui, input: &dyn ProfileInput) -> Result<()> {
    paths.ensure_dirs()?;

    let existing = list_profiles(paths, None)?;
    let draft = input.profile_draft(&existing)?;
    let doc = draft.into_document(&existing)?;

    let profile = create_profile(paths, &draft.name, &doc)?;

    ui.ok(format!("Created profile '{}'", profile.name));
    ui.newline();
    ui.println("To activate it:");
    ui.println(format!(
        "  {} use --profile '{}'",
        ui.bold("git-sw"),
        profile.name
    ));
    Ok(())
}

/// Switch the active profile in `scope`
pub fn use_profile(
    paths: &Paths,
    ui: &Ui,
    input: &dyn ProfileInput,
    scope: Scope,
    cwd: &Path,
) -> Result<()> {
    // fails outside a repository before anything is read or written
    let target = Target::resolve(paths, scope, cwd)?;

    let active = active_include(paths, &target)?;
    let profiles = list_profiles(paths, active.as_deref())?;
    let profile = choose_profile(input, "Select profile to use:", &profiles)?;

    let spinner = ui.spinner(format!("Switching to profile '{}'...", profile.name));
    let result = if profile.is_default() {
        deactivate(paths, &target).map(|_| ())
    } else {
        activate(paths, &target, &profile.path)
    };

    match result {
        Ok(()) => {
            ui.spinner_finish_ok(
                &spinner,
                format!("Using profile '{}' ({} config)", profile.name, target.scope),
            );
            Ok(())
        }
        Err(e) => {
            ui.spinner_finish_err(&spinner, format!("Failed to switch: {}", e));
            Err(e)
        }
    }
}

/// List all profiles, marking the one in effect for `cwd`
pub fn list(paths: &Paths, ui: &Ui, cwd: &Path, json: bool) -> Result<()> {
    let active = effective_include(paths, cwd)?;
    let profiles = list_profiles(paths, active.as_deref())?;

    if json {
        let out = serde_json::to_string_pretty(&profiles).context("Failed to serialize profiles")?;
        ui.println(out);
        return Ok(());
    }

    let mut table = ui.simple_table();
    table.set_header(vec![
        ui.header_cell(""),
        ui.header_cell("Profile"),
        ui.header_cell("Identity"),
        ui.header_cell("Signing"),
        ui.header_cell("Modified"),
    ]);

    for profile in &profiles {
        let icon = if profile.is_active { ui.icon_ok() } else { " " };
        let name_cell = if profile.is_active {
            ui.colored_cell(&profile.name, AnsiColor::Green)
        } else {
            ui.cell(&profile.name)
        };

        table.add_row(vec![
            ui.cell(icon),
            name_cell,
            ui.cell(identity(profile)),
            ui.cell(profile.config.get("gpg.format").unwrap_or("-")),
            ui.cell(modified(&profile.path)),
        ]);
    }

    ui.section("Profiles");
    ui.println(table.to_string());
    ui.println(ui.dim(format!("Stored in {}", paths.storage_root.display())));

    if profiles.len() == 1 {
        ui.newline();
        ui.println("Create one with:");
        ui.println(format!("  {} create", ui.bold("git-sw")));
    }
    Ok(())
}

fn identity(profile: &Profile) -> String {
    if profile.is_default() {
        return "(global config)".to_string();
    }
    match (profile.config.get("user.name"), profile.config.get("user.email")) {
        (Some(name), Some(email)) => format!("{name} <{email}>"),
        (Some(name), None) => name.to_string(),
        (None, Some(email)) => format!("<{email}>"),
        (None, None) => "-".to_string(),
    }
}

fn modified(path: &Path) -> String {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| "-".to_string())
}

/// Edit a profile's document, or the global config with `-g`
pub fn edit(
    paths: &Paths,
    ui: &Ui,
    input: &dyn ProfileInput,
    scope: Scope,
) -> Result<()> {
    if scope == Scope::Global {
        if let Some(name) = input.preselected() {
            if !hasher::same_name(name, DEFAULT_PROFILE_NAME) {
                bail!(GitswError::EditProfileGlobally(name.to_string()));
            }
        }
        input.edit_file(&paths.global_config)?;
        ui.ok(format!("Edited {}", paths.global_config.display()));
        return Ok(());
    }

    let profiles = list_profiles(paths, None)?;
    let profile = choose_profile(input, "Select profile to edit:", &profiles)?;
    if profile.is_default() {
        bail!(GitswError::EditDefaultConfig);
    }

    input.edit_file(&profile.path)?;
    ui.ok(format!("Edited profile '{}'", profile.name));
    Ok(())
}

/// Delete a profile. With `-g`, delete the user's global config instead.
pub fn delete(
    paths: &Paths,
    ui: &Ui,
    input: &dyn ProfileInput,
    scope: Scope,
    cwd: &Path,
) -> Result<()> {
    if scope == Scope::Global {
        return delete_global(paths, ui, input);
    }

    let profiles = list_profiles(paths, None)?;
    let profile = choose_profile(input, "Select profile to delete:", &profiles)?;
    if profile.is_default() {
        bail!(GitswError::DeleteDefaultConfig);
    }

    // no include may outlive the file it points at
    let matcher = IncludeMatch::Profile(&profile.dir_name);
    let mut retracted = retract(paths, &Target::global(paths), matcher)?;
    if let Some(local) = git::find_local_config(cwd)? {
        let target = Target {
            scope: Scope::Local,
            path: local,
        };
        retracted += retract(paths, &target, matcher)?;
    }
    tracing::debug!(profile = %profile.name, retracted, "includes retracted before delete");

    remove_profile(paths, profile)?;
    ui.ok(format!("Deleted profile '{}'", profile.name));
    Ok(())
}

fn delete_global(paths: &Paths, ui: &Ui, input: &dyn ProfileInput) -> Result<()> {
    if !input.confirm_delete(&paths.global_config)? {
        ui.warn("Delete cancelled.");
        return Ok(());
    }

    let default_dir = hasher::dir_name(DEFAULT_PROFILE_NAME);
    retract(
        paths,
        &Target::global(paths),
        IncludeMatch::Profile(&default_dir),
    )?;

    let snapshot = paths.default_dir();
    if snapshot.exists() {
        fs::remove_dir_all(&snapshot)
            .with_context(|| format!("Failed to remove {}", snapshot.display()))?;
    }
    if paths.global_config.exists() {
        fs::remove_file(&paths.global_config)
            .with_context(|| format!("Failed to remove {}", paths.global_config.display()))?;
    }

    ui.ok(format!("Deleted {}", paths.global_config.display()));
    Ok(())
}

/// Run diagnostics
pub fn doctor(paths: &Paths, ui: &Ui, cwd: &Path) -> Result<()> {
    if !run_doctor(paths, ui, cwd) {
        bail!("doctor found problems");
    }
    Ok(())
}
