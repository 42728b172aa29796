use std::path::PathBuf;

use thiserror::Error;

/// Errors with a meaning of their own, as opposed to plain I/O failures
/// which travel as `anyhow` context chains.
#[derive(Error, Debug)]
pub enum GitswError {
    /// A required input field was left empty.
    #[error("field can't be empty")]
    EmptyField,
    /// Email does not parse as an address.
    #[error("invalid email format")]
    InvalidEmail,
    /// Value cannot be written to a git config file and read back unchanged.
    #[error("invalid config value {value:?}: {reason}")]
    InvalidValue { value: String, reason: &'static str },
    /// Config key is not of the form `section.name`.
    #[error("invalid config key: '{0}'")]
    InvalidKey(String),
    #[error("invalid key format '{0}': must be 'openpgp', 'ssh', or 'x509'")]
    InvalidKeyFormat(String),
    #[error("--signing-key is required when --key-format is specified")]
    MissingSigningKey,
    #[error("invalid public key file extension, expected '.pub'")]
    InvalidPublicKeyExt,
    #[error("invalid SSH public key: {0}")]
    InvalidSshKey(String),
    #[error("'{0}' is reserved for the default profile")]
    ReservedProfileName(String),
    #[error("profile with given name already exists: '{0}'")]
    DuplicateProfile(String),
    #[error("profile not found: '{0}'")]
    ProfileNotFound(String),
    /// Two distinct names hashed to the same storage directory.
    #[error("storage directory for profile '{name}' already exists: {}", dir.display())]
    HashCollision { name: String, dir: PathBuf },
    #[error("use 'git-sw -g edit' to edit the default config")]
    EditDefaultConfig,
    #[error("only the default config can be edited with -g, use 'git-sw edit' for '{0}'")]
    EditProfileGlobally(String),
    #[error("use 'git-sw -g delete' to delete the default config")]
    DeleteDefaultConfig,
    #[error("delete aborted: confirmation required")]
    DeleteAborted,
    #[error("not in a git directory")]
    NotGitDirectory,
    #[error("failed to determine home directory")]
    HomeDirNotFound,
    #[error("missing required flag: --{0}")]
    MissingFlag(&'static str),
    #[error("interactive edit is not supported in --no-tui mode")]
    EditUnsupported,
    #[error("flag -g can only be used with the 'use', 'edit', and 'delete' commands")]
    GlobalNotAllowed,
    /// Malformed line in a config file.
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}
