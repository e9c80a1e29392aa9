//! Structural validation of API keys and profile names

use crate::error::{KeyprofileError, Result};
use crate::redact::{VISIBLE_PREFIX, VISIBLE_SUFFIX};

/// Shortest API key accepted.
pub const MIN_KEY_LEN: usize = 12;

// Every accepted key must be long enough to redact.
const _: () = assert!(MIN_KEY_LEN >= VISIBLE_PREFIX + VISIBLE_SUFFIX);

/// Key type prefixes the API issues: secret and restricted keys.
const ACCEPTED_KEY_TYPES: [&str; 2] = ["sk", "rk"];

/// Check that `key` has the shape of a secret or restricted API key.
///
/// Keys look like `sk_test_...` or `rk_live_...`: at least three
/// underscore-separated parts made of ASCII letters and digits. The caller is
/// expected to have trimmed surrounding whitespace already.
pub fn validate_api_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(KeyprofileError::validation(
            "API key is required, please provide your test mode secret API key",
        ));
    }

    if key.chars().count() < MIN_KEY_LEN {
        return Err(KeyprofileError::validation(format!(
            "API key is too short, must be at least {} characters long",
            MIN_KEY_LEN
        )));
    }

    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(KeyprofileError::validation(
            "API key contains invalid characters; only letters, digits and '_' are allowed",
        ));
    }

    let parts: Vec<&str> = key.split('_').collect();
    if parts.len() < 3 {
        return Err(KeyprofileError::validation(
            "you are using a legacy-style API key which is unsupported by the CLI",
        ));
    }

    if !ACCEPTED_KEY_TYPES.contains(&parts[0]) {
        return Err(KeyprofileError::validation(
            "the CLI only supports using a secret or restricted key",
        ));
    }

    Ok(())
}

/// Check that a profile name can be used as a table name in the config file.
pub fn validate_profile_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(KeyprofileError::validation("profile name must not be empty"));
    }
    Ok(())
}
