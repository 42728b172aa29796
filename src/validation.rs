//! Input validation for profile fields.
//!
//! Everything here runs before a profile document is built, so a value that
//! fails any check never reaches disk.

use validator::ValidateEmail;

use crate::error::GitswError;
use crate::gitconfig::validate_value;
use crate::hasher;
use crate::paths::DEFAULT_PROFILE_NAME;
use crate::profiles::Profile;

pub fn validate_not_empty(s: &str) -> Result<(), GitswError> {
    if s.trim().is_empty() {
        return Err(GitswError::EmptyField);
    }
    Ok(())
}

/// Validates a new profile name against the existing profiles
pub fn validate_profile_name(name: &str, existing: &[Profile]) -> Result<(), GitswError> {
    validate_not_empty(name)?;
    if hasher::same_name(name, DEFAULT_PROFILE_NAME) {
        return Err(GitswError::ReservedProfileName(name.to_string()));
    }
    if existing.iter().any(|p| hasher::same_name(&p.name, name)) {
        return Err(GitswError::DuplicateProfile(name.to_string()));
    }
    // the name is stored inside the profile's own config document
    validate_value(name)
}

/// Validates `user.name` input
pub fn validate_git_name(name: &str) -> Result<(), GitswError> {
    validate_not_empty(name)?;
    validate_value(name)
}

/// Validates `user.email` input
pub fn validate_git_email(email: &str) -> Result<(), GitswError> {
    validate_not_empty(email)?;
    if !email.validate_email() {
        return Err(GitswError::InvalidEmail);
    }
    validate_value(email)
}
