//! Where profile data and selections come from.
//!
//! Commands never prompt directly; they ask a [`ProfileInput`]. The
//! interactive implementation drives `inquire` prompts and the user's
//! editor, while `--no-tui` mode reads everything from flags.

use anyhow::{Context, Result, bail};
use inquire::{Confirm, Select, Text};
use std::path::Path;
use std::process::Command;

use crate::error::GitswError;
use crate::gitconfig::ConfigDocument;
use crate::profiles::{Profile, find_profile};
use crate::signing::{DEFAULT_GPG_PROGRAM, KeyFormat, SigningKey, validate_key};
use crate::ui::Ui;
use crate::validation::{validate_git_email, validate_git_name, validate_profile_name};

/// Everything needed to create a profile, not yet validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDraft {
    pub name: String,
    pub git_name: String,
    pub git_email: String,
    pub signing: Option<SigningKey>,
}

impl ProfileDraft {
    /// Validate every field and build the profile's config document.
    ///
    /// Nothing is written; a draft that fails here never reaches disk.
    pub fn into_document(&self, existing: &[Profile]) -> Result<ConfigDocument> {
        validate_profile_name(&self.name, existing)?;
        validate_git_name(&self.git_name)?;
        validate_git_email(&self.git_email)?;
        if let Some(signing) = &self.signing {
            signing.validate()?;
        }

        let mut doc = ConfigDocument::new();
        doc.set("user.name", &self.git_name)?;
        doc.set("user.email", &self.git_email)?;
        if let Some(signing) = &self.signing {
            signing.apply(&mut doc)?;
        }
        Ok(doc)
    }
}

pub trait ProfileInput {
    /// Gather the fields of a new profile.
    fn profile_draft(&self, existing: &[Profile]) -> Result<ProfileDraft>;

    /// Pick one of `profiles`, returning its index.
    fn select_profile(&self, prompt: &str, profiles: &[Profile]) -> Result<usize>;

    /// Ask before deleting the user's global config.
    fn confirm_delete(&self, target: &Path) -> Result<bool>;

    /// Let the user edit `path`.
    fn edit_file(&self, path: &Path) -> Result<()>;

    /// A profile named up front, skipping selection
    fn preselected(&self) -> Option<&str> {
        None
    }
}

/// Resolve the profile a command acts on: the preselected name if any,
/// otherwise whatever the user picks.
pub fn choose_profile<'a>(
    input: &dyn ProfileInput,
    prompt: &str,
    profiles: &'a [Profile],
) -> Result<&'a Profile> {
    if let Some(name) = input.preselected() {
        return find_profile(profiles, name)
            .ok_or_else(|| GitswError::ProfileNotFound(name.to_string()).into());
    }

    let idx = input.select_profile(prompt, profiles)?;
    profiles
        .get(idx)
        .with_context(|| format!("Selection out of range: {idx}"))
}

// -----------------------------------------------------------------------------
// Interactive prompts
// -----------------------------------------------------------------------------

pub struct Interactive {
    ui: Ui,
    profile: Option<String>,
}

impl Interactive {
    pub fn new(ui: Ui, profile: Option<String>) -> Self {
        Self { ui, profile }
    }

    /// Prompt until the answer passes `validate`. Validation failures are
    /// shown and asked again; anything else is returned.
    fn prompt_until_valid<F>(&self, message: &str, validate: F) -> Result<String>
    where
        F: Fn(&str) -> Result<()>,
    {
        loop {
            let input = Text::new(message).prompt().context("Prompt cancelled")?;
            match validate(&input) {
                Ok(()) => break Ok(input),
                Err(err) if err.downcast_ref::<GitswError>().is_some() => {
                    self.ui.warn(err.to_string());
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn signing_key(&self) -> Result<Option<SigningKey>> {
        let wanted = Confirm::new("Sign commits with this profile?")
            .with_default(false)
            .prompt()
            .context("Prompt cancelled")?;
        if !wanted {
            return Ok(None);
        }

        let format = Select::new("Key format:", KeyFormat::all())
            .prompt()
            .context("Prompt cancelled")?;
        let key = self.prompt_until_valid(format.key_prompt(), |s| validate_key(format, s))?;

        let program = if format == KeyFormat::OpenPgp {
            let program = Text::new("GPG program:")
                .with_default(DEFAULT_GPG_PROGRAM)
                .prompt()
                .context("Prompt cancelled")?;
            Some(program)
        } else {
            None
        };

        Ok(Some(SigningKey {
            format,
            key,
            program,
        }))
    }
}

impl ProfileInput for Interactive {
    fn profile_draft(&self, existing: &[Profile]) -> Result<ProfileDraft> {
        let name = match &self.profile {
            Some(name) => name.clone(),
            None => self.prompt_until_valid("Profile name:", |s| {
                Ok(validate_profile_name(s, existing)?)
            })?,
        };
        let git_name = self.prompt_until_valid("Git user name:", |s| Ok(validate_git_name(s)?))?;
        let git_email =
            self.prompt_until_valid("Git user email:", |s| Ok(validate_git_email(s)?))?;
        let signing = self.signing_key()?;

        Ok(ProfileDraft {
            name,
            git_name,
            git_email,
            signing,
        })
    }

    fn select_profile(&self, prompt: &str, profiles: &[Profile]) -> Result<usize> {
        let options: Vec<String> = profiles
            .iter()
            .map(|p| {
                if p.is_active {
                    format!("{} (active)", p.name)
                } else {
                    p.name.clone()
                }
            })
            .collect();

        let selected = Select::new(prompt, options)
            .raw_prompt()
            .context("Selection cancelled")?;
        Ok(selected.index)
    }

    fn confirm_delete(&self, target: &Path) -> Result<bool> {
        Confirm::new(&format!("Delete {} and the default profile?", target.display()))
            .with_default(false)
            .with_help_message("Your global git config will be removed")
            .prompt()
            .context("Confirmation cancelled")
    }

    fn edit_file(&self, path: &Path) -> Result<()> {
        open_in_editor(path)
    }

    fn preselected(&self) -> Option<&str> {
        self.profile.as_deref()
    }
}

/// Open a file in `$VISUAL`, `$EDITOR`, or the platform's fallback editor
fn open_in_editor(path: &Path) -> Result<()> {
    let editor = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| fallback_editor().to_string());

    // allow things like `code --wait`
    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or(fallback_editor());

    tracing::debug!(%editor, path = %path.display(), "opening editor");
    let status = Command::new(program)
        .args(parts)
        .arg(path)
        .status()
        .with_context(|| format!("Failed to run editor: {}", editor))?;

    if !status.success() {
        bail!("Editor exited with non-zero status");
    }
    Ok(())
}

fn fallback_editor() -> &'static str {
    if cfg!(windows) { "notepad" } else { "vi" }
}

// -----------------------------------------------------------------------------
// Flags (--no-tui)
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct NonInteractive {
    pub profile: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub signing_key: Option<String>,
    pub key_format: Option<String>,
    pub gpg_program: Option<String>,
    pub yes: bool,
}

impl NonInteractive {
    fn signing(&self) -> Result<Option<SigningKey>> {
        if self.signing_key.is_none() && self.key_format.is_none() {
            return Ok(None);
        }
        let key = self
            .signing_key
            .clone()
            .ok_or(GitswError::MissingSigningKey)?;
        let format = match &self.key_format {
            Some(format) => format.parse()?,
            None => KeyFormat::OpenPgp,
        };

        Ok(Some(SigningKey {
            format,
            key,
            program: self.gpg_program.clone(),
        }))
    }
}

fn required(value: &Option<String>, flag: &'static str) -> Result<String, GitswError> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or(GitswError::MissingFlag(flag))
}

impl ProfileInput for NonInteractive {
    fn profile_draft(&self, _existing: &[Profile]) -> Result<ProfileDraft> {
        Ok(ProfileDraft {
            name: required(&self.profile, "profile")?,
            git_name: required(&self.name, "name")?,
            git_email: required(&self.email, "email")?,
            signing: self.signing()?,
        })
    }

    fn select_profile(&self, _prompt: &str, _profiles: &[Profile]) -> Result<usize> {
        bail!(GitswError::MissingFlag("profile"))
    }

    fn confirm_delete(&self, _target: &Path) -> Result<bool> {
        if !self.yes {
            bail!(GitswError::DeleteAborted);
        }
        Ok(true)
    }

    fn edit_file(&self, _path: &Path) -> Result<()> {
        bail!(GitswError::EditUnsupported)
    }

    fn preselected(&self) -> Option<&str> {
        self.profile.as_deref().filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher;
    use crate::signing::tests::{ed25519_line, write_key};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn profile(name: &str) -> Profile {
        Profile {
            name: name.to_string(),
            dir_name: hasher::dir_name(name),
            path: PathBuf::from("/nowhere"),
            config: ConfigDocument::new(),
            is_active: false,
        }
    }

    fn flags() -> NonInteractive {
        NonInteractive {
            profile: Some("work".into()),
            name: Some("Jane Doe".into()),
            email: Some("jane@example.com".into()),
            ..Default::default()
        }
    }

    fn kind(err: &anyhow::Error) -> Option<&GitswError> {
        err.downcast_ref::<GitswError>()
    }

    #[test]
    fn test_draft_from_flags() {
        let draft = flags().profile_draft(&[]).unwrap();
        assert_eq!(draft.name, "work");
        assert_eq!(draft.signing, None);

        let doc = draft.into_document(&[]).unwrap();
        assert_eq!(doc.get("user.name"), Some("Jane Doe"));
        assert_eq!(doc.get("user.email"), Some("jane@example.com"));
    }

    #[test]
    fn test_missing_flags() {
        let mut input = flags();
        input.email = None;
        let err = input.profile_draft(&[]).unwrap_err();
        assert!(matches!(kind(&err), Some(GitswError::MissingFlag("email"))));

        let mut input = flags();
        input.profile = Some(String::new());
        let err = input.profile_draft(&[]).unwrap_err();
        assert!(matches!(kind(&err), Some(GitswError::MissingFlag("profile"))));
    }

    #[test]
    fn test_key_format_without_key() {
        let mut input = flags();
        input.key_format = Some("ssh".into());
        let err = input.profile_draft(&[]).unwrap_err();
        assert!(matches!(kind(&err), Some(GitswError::MissingSigningKey)));
    }

    #[test]
    fn test_key_defaults_to_openpgp() {
        let mut input = flags();
        input.signing_key = Some("ABCDEF01".into());
        let draft = input.profile_draft(&[]).unwrap();
        let signing = draft.signing.clone().unwrap();
        assert_eq!(signing.format, KeyFormat::OpenPgp);

        let doc = draft.into_document(&[]).unwrap();
        assert_eq!(doc.get("gpg.program"), Some("gpg"));
        assert_eq!(doc.get("commit.gpgsign"), Some("true"));
    }

    #[test]
    fn test_bad_key_format() {
        let mut input = flags();
        input.signing_key = Some("ABCDEF01".into());
        input.key_format = Some("pgp".into());
        let err = input.profile_draft(&[]).unwrap_err();
        assert!(matches!(kind(&err), Some(GitswError::InvalidKeyFormat(_))));
    }

    #[test]
    fn test_draft_validation() {
        let existing = vec![profile("Work")];
        let err = flags()
            .profile_draft(&existing)
            .unwrap()
            .into_document(&existing)
            .unwrap_err();
        assert!(matches!(kind(&err), Some(GitswError::DuplicateProfile(_))));

        let mut input = flags();
        input.email = Some("not-an-email".into());
        let err = input.profile_draft(&[]).unwrap().into_document(&[]).unwrap_err();
        assert!(matches!(kind(&err), Some(GitswError::InvalidEmail)));
    }

    #[test]
    fn test_ssh_key_draft() {
        let temp_dir = TempDir::new().unwrap();
        let mut input = flags();
        input.key_format = Some("ssh".into());

        input.signing_key = Some(write_key(&temp_dir, "id_ed25519", &ed25519_line()));
        let err = input.profile_draft(&[]).unwrap().into_document(&[]).unwrap_err();
        assert!(matches!(kind(&err), Some(GitswError::InvalidPublicKeyExt)));

        let key = write_key(&temp_dir, "id_ed25519.pub", &ed25519_line());
        input.signing_key = Some(key.clone());
        let doc = input.profile_draft(&[]).unwrap().into_document(&[]).unwrap();
        assert_eq!(doc.get("gpg.format"), Some("ssh"));
        assert_eq!(doc.get("user.signingkey"), Some(key.as_str()));
        assert_eq!(doc.get("gpg.program"), None);
    }

    #[test]
    fn test_choose_profile() {
        let profiles = vec![profile("default"), profile("Work")];

        let input = flags();
        assert_eq!(choose_profile(&input, "", &profiles).unwrap().name, "Work");

        let input = NonInteractive {
            profile: Some("home".into()),
            ..Default::default()
        };
        let err = choose_profile(&input, "", &profiles).unwrap_err();
        assert!(matches!(kind(&err), Some(GitswError::ProfileNotFound(_))));

        let err = choose_profile(&NonInteractive::default(), "", &profiles).unwrap_err();
        assert!(matches!(kind(&err), Some(GitswError::MissingFlag("profile"))));
    }

    #[test]
    fn test_delete_needs_yes() {
        let target = Path::new("/home/jane/.gitconfig");
        let err = NonInteractive::default().confirm_delete(target).unwrap_err();
        assert!(matches!(kind(&err), Some(GitswError::DeleteAborted)));

        let input = NonInteractive {
            yes: true,
            ..Default::default()
        };
        assert!(input.confirm_delete(target).unwrap());
    }

    #[test]
    fn test_edit_unsupported() {
        let err = flags().edit_file(Path::new("/tmp/x")).unwrap_err();
        assert!(matches!(kind(&err), Some(GitswError::EditUnsupported)));
    }
}
