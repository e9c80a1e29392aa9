//! The `configure` and `show` flows
//!
//! `configure` prompts for an API key, validates it, shows it redacted, asks
//! for a device name and then writes the profile in a single store update. Any
//! failure stops the flow before the store is touched.

use crate::device::resolve_device_name;
use crate::error::{KeyprofileError, Result};
use crate::profile::ProfileStore;
use crate::prompt::{LineSource, output_error};
use crate::redact::redact;
use crate::validate::{validate_api_key, validate_profile_name};
use std::io::Write;
use zeroize::Zeroizing;

/// Prompt for the API key, validate it and echo back its redacted form.
pub fn read_api_key(
    input: &mut dyn LineSource,
    output: &mut dyn Write,
) -> Result<Zeroizing<String>> {
    write!(output, "Enter your test mode secret API key: ")
        .and_then(|()| output.flush())
        .map_err(output_error)?;

    let raw = input.read_secret()?;
    let api_key = Zeroizing::new(raw.trim().to_string());
    if api_key.is_empty() {
        return Err(KeyprofileError::validation(
            "API key is required, please provide your test mode secret API key",
        ));
    }
    validate_api_key(&api_key)?;

    writeln!(output, "Your API key is: {}", redact(&api_key)).map_err(output_error)?;
    Ok(api_key)
}

/// Configures one profile from interactive input
pub struct ConfigureCommand<'a> {
    store: &'a ProfileStore,
    profile_name: &'a str,
}

impl<'a> ConfigureCommand<'a> {
    pub fn new(store: &'a ProfileStore, profile_name: &'a str) -> Self {
        Self {
            store,
            profile_name,
        }
    }

    pub fn run(&self, input: &mut dyn LineSource, output: &mut dyn Write) -> Result<()> {
        // Reject a bad profile name before asking for anything secret.
        validate_profile_name(self.profile_name)?;

        let api_key = read_api_key(input, output)?;
        let device_name = resolve_device_name(input, output)?;

        self.store
            .configure(self.profile_name, &api_key, device_name.as_deref())
            .map_err(|e| e.with_context(format!("failed to save profile '{}'", self.profile_name)))?;

        writeln!(output, "You're configured and all set to get started").map_err(output_error)?;
        Ok(())
    }
}

/// Print a stored profile with its key redacted.
pub fn show_profile(store: &ProfileStore, profile_name: &str, output: &mut dyn Write) -> Result<()> {
    let profile = store.profile(profile_name)?.ok_or_else(|| {
        KeyprofileError::validation(format!(
            "profile '{}' is not configured; run `keyprofile configure` first",
            profile_name
        ))
    })?;

    let key = match profile.secret_key.as_deref() {
        Some(key) if validate_api_key(key).is_ok() => redact(key),
        Some(_) => "(invalid, run configure again)".to_string(),
        None => "(not set)".to_string(),
    };

    writeln!(output, "Profile: {}", profile.name)
        .and_then(|()| {
            writeln!(
                output,
                "Device name: {}",
                profile.device_name.as_deref().unwrap_or("(not set)")
            )
        })
        .and_then(|()| writeln!(output, "API key: {}", key))
        .map_err(output_error)?;
    Ok(())
}
