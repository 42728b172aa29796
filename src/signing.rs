//! Commit-signing key settings.
//!
//! Every format ends up as the same trio of config entries (`gpg.format`,
//! `user.signingKey`, `commit.gpgsign`); OpenPGP additionally names the
//! program used to sign.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::GitswError;
use crate::gitconfig::{ConfigDocument, validate_value};
use crate::validation::validate_not_empty;

/// Program used for OpenPGP signing when none is given
pub const DEFAULT_GPG_PROGRAM: &str = "gpg";

/// Key types accepted in an SSH public key file
const SSH_KEY_TYPES: &[&str] = &[
    "ssh-ed25519",
    "ssh-rsa",
    "ssh-dss",
    "ecdsa-sha2-nistp256",
    "ecdsa-sha2-nistp384",
    "ecdsa-sha2-nistp521",
    "sk-ssh-ed25519@openssh.com",
    "sk-ecdsa-sha2-nistp256@openssh.com",
];

/// Signing key formats understood by git's `gpg.format`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    OpenPgp,
    Ssh,
    X509,
}

impl KeyFormat {
    pub fn all() -> Vec<KeyFormat> {
        vec![KeyFormat::OpenPgp, KeyFormat::Ssh, KeyFormat::X509]
    }

    /// Value written to `gpg.format`
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyFormat::OpenPgp => "openpgp",
            KeyFormat::Ssh => "ssh",
            KeyFormat::X509 => "x509",
        }
    }

    /// Prompt shown when asking for the key itself
    pub fn key_prompt(&self) -> &'static str {
        match self {
            KeyFormat::OpenPgp => "Enter your GPG key",
            KeyFormat::Ssh => "Enter path to your public key",
            KeyFormat::X509 => "Enter your certificate ID",
        }
    }
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyFormat {
    type Err = GitswError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openpgp" => Ok(KeyFormat::OpenPgp),
            "ssh" => Ok(KeyFormat::Ssh),
            "x509" => Ok(KeyFormat::X509),
            _ => Err(GitswError::InvalidKeyFormat(s.to_string())),
        }
    }
}

/// A signing key as entered by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    pub format: KeyFormat,
    /// GPG key id, path to an SSH public key, or X.509 certificate id
    pub key: String,
    /// Signing program; only meaningful for OpenPGP
    pub program: Option<String>,
}

impl SigningKey {
    pub fn validate(&self) -> Result<()> {
        validate_key(self.format, &self.key)?;
        if let Some(program) = &self.program {
            validate_not_empty(program)?;
            validate_value(program)?;
        }
        Ok(())
    }

    /// Write the signing entries into `doc`.
    pub fn apply(&self, doc: &mut ConfigDocument) -> Result<(), GitswError> {
        if self.format == KeyFormat::OpenPgp {
            let program = self.program.as_deref().unwrap_or(DEFAULT_GPG_PROGRAM);
            doc.set("gpg.program", program)?;
        }
        doc.set("gpg.format", self.format.as_str())?;
        doc.set("user.signingKey", &self.key)?;
        doc.set("commit.gpgsign", "true")?;
        Ok(())
    }
}

/// Validate a key string for the given format.
///
/// SSH keys must name a `.pub` file holding a parseable public key.
pub fn validate_key(format: KeyFormat, key: &str) -> Result<()> {
    validate_not_empty(key)?;
    validate_value(key)?;
    if format == KeyFormat::Ssh {
        validate_ssh_public_key(Path::new(key))?;
    }
    Ok(())
}

pub fn validate_ssh_public_key(path: &Path) -> Result<()> {
    if path.extension().is_none_or(|ext| ext != "pub") {
        return Err(GitswError::InvalidPublicKeyExt.into());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Cannot read SSH key: {}", path.display()))?;
    parse_authorized_key(&content).map_err(GitswError::InvalidSshKey)?;
    Ok(())
}

/// Parse the first key line of an authorized-keys style file and return its
/// key type.
///
/// Accepts an optional leading options field, checks the type is known and
/// that the base64 blob decodes and starts with the same type name.
pub(crate) fn parse_authorized_key(content: &str) -> Result<String, String> {
    let line = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .ok_or("no key found")?;

    let mut fields = line.split_whitespace();
    let mut key_type = fields.next().ok_or("no key found")?;
    if !SSH_KEY_TYPES.contains(&key_type) {
        key_type = fields.next().ok_or("missing key type")?;
        if !SSH_KEY_TYPES.contains(&key_type) {
            return Err(format!("unknown key type '{key_type}'"));
        }
    }

    let data = fields.next().ok_or("missing key data")?;
    let blob = STANDARD
        .decode(data)
        .map_err(|e| format!("malformed key data: {e}"))?;

    // SSH wire format: u32 length, then the key type name
    if blob.len() < 4 {
        return Err("truncated key data".to_string());
    }
    let (len, rest) = blob.split_at(4);
    let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
    let embedded = rest.get(..len).ok_or("truncated key data")?;
    if embedded != key_type.as_bytes() {
        return Err("key type does not match key data".to_string());
    }
    if rest.len() == len {
        return Err("missing key material".to_string());
    }

    Ok(key_type.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// A syntactically valid ed25519 public key line
    pub(crate) fn ed25519_line() -> String {
        let mut blob = Vec::new();
        blob.extend_from_slice(&11u32.to_be_bytes());
        blob.extend_from_slice(b"ssh-ed25519");
        blob.extend_from_slice(&32u32.to_be_bytes());
        blob.extend_from_slice(&[7u8; 32]);
        format!("ssh-ed25519 {} jane@example.com\n", STANDARD.encode(blob))
    }

    pub(crate) fn write_key(dir: &TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_key_format_parse() {
        assert_eq!("OpenPGP".parse::<KeyFormat>().unwrap(), KeyFormat::OpenPgp);
        assert_eq!("ssh".parse::<KeyFormat>().unwrap(), KeyFormat::Ssh);
        assert_eq!("x509".parse::<KeyFormat>().unwrap(), KeyFormat::X509);
        assert!(matches!(
            "pgp".parse::<KeyFormat>(),
            Err(GitswError::InvalidKeyFormat(_))
        ));
    }

    #[test]
    fn test_parse_authorized_key() {
        assert_eq!(parse_authorized_key(&ed25519_line()).unwrap(), "ssh-ed25519");

        let with_options = format!("no-pty {}", ed25519_line());
        assert_eq!(parse_authorized_key(&with_options).unwrap(), "ssh-ed25519");

        assert!(parse_authorized_key("").is_err());
        assert!(parse_authorized_key("ssh-ed25519 !!!notbase64").is_err());
        assert!(parse_authorized_key("ssh-ed25519").is_err());
        // blob says ed25519 but line claims rsa
        let mismatched = ed25519_line().replacen("ssh-ed25519", "ssh-rsa", 1);
        assert!(parse_authorized_key(&mismatched).is_err());
    }

    #[test]
    fn test_ssh_key_requires_pub_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_key(&temp_dir, "id_ed25519", &ed25519_line());

        let err = validate_key(KeyFormat::Ssh, &path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitswError>(),
            Some(GitswError::InvalidPublicKeyExt)
        ));
    }

    #[test]
    fn test_ssh_key_file_contents() {
        let temp_dir = TempDir::new().unwrap();
        let good = write_key(&temp_dir, "good.pub", &ed25519_line());
        let bad = write_key(&temp_dir, "bad.pub", "not a key\n");

        assert!(validate_key(KeyFormat::Ssh, &good).is_ok());
        let err = validate_key(KeyFormat::Ssh, &bad).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitswError>(),
            Some(GitswError::InvalidSshKey(_))
        ));

        let missing = temp_dir.path().join("missing.pub");
        assert!(validate_key(KeyFormat::Ssh, &missing.to_string_lossy()).is_err());
    }

    #[test]
    fn test_apply_openpgp_defaults_program() {
        let key = SigningKey {
            format: KeyFormat::OpenPgp,
            key: "ABCDEF0123456789".to_string(),
            program: None,
        };
        key.validate().unwrap();

        let mut doc = ConfigDocument::new();
        key.apply(&mut doc).unwrap();
        assert_eq!(doc.get("gpg.program"), Some("gpg"));
        assert_eq!(doc.get("gpg.format"), Some("openpgp"));
        assert_eq!(doc.get("user.signingkey"), Some("ABCDEF0123456789"));
        assert_eq!(doc.get("commit.gpgsign"), Some("true"));
    }

    #[test]
    fn test_apply_x509_has_no_program() {
        let key = SigningKey {
            format: KeyFormat::X509,
            key: "0x1234".to_string(),
            program: Some("gpgsm".to_string()),
        };
        let mut doc = ConfigDocument::new();
        key.apply(&mut doc).unwrap();
        assert_eq!(doc.get("gpg.program"), None);
        assert_eq!(doc.get("gpg.format"), Some("x509"));
    }

    #[test]
    fn test_empty_key_rejected() {
        let err = validate_key(KeyFormat::OpenPgp, "").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitswError>(),
            Some(GitswError::EmptyField)
        ));
    }
}
