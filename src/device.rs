//! Human-readable label for the current machine

use crate::error::Result;
use crate::prompt::{LineSource, output_error};
use std::io::Write;
use tracing::{debug, warn};

/// Label stored when the host name cannot be determined.
pub const UNKNOWN_DEVICE: &str = "unknown";

/// The system host name, if it can be determined.
pub fn system_host_name() -> Option<String> {
    match hostname::get() {
        Ok(name) => {
            let name = name.to_string_lossy().trim().to_string();
            if name.is_empty() { None } else { Some(name) }
        }
        Err(e) => {
            warn!(error = %e, "unable to determine host name");
            None
        }
    }
}

/// The host name, or [`UNKNOWN_DEVICE`] when it is unavailable.
pub fn default_device_name() -> String {
    system_host_name().unwrap_or_else(|| UNKNOWN_DEVICE.to_string())
}

/// Ask the user how to identify this machine, offering the host name as default.
///
/// Returns `None` only when the user accepted the default and no host name was
/// available; the caller then resolves the fallback when it persists the value.
pub fn resolve_device_name(
    input: &mut dyn LineSource,
    output: &mut dyn Write,
) -> Result<Option<String>> {
    prompt_device_name(input, output, system_host_name())
}

fn prompt_device_name(
    input: &mut dyn LineSource,
    output: &mut dyn Write,
    default: Option<String>,
) -> Result<Option<String>> {
    write!(
        output,
        "How would you like to identify this device? [default: {}] ",
        default.as_deref().unwrap_or(UNKNOWN_DEVICE)
    )
    .and_then(|()| output.flush())
    .map_err(output_error)?;

    // An unreadable answer is treated like an empty one.
    let answer = match input.read_line() {
        Ok(line) => line,
        Err(e) => {
            debug!(error = %e, "no device name entered, using default");
            String::new()
        }
    };

    let answer = answer.trim();
    if answer.is_empty() {
        Ok(default)
    } else {
        Ok(Some(answer.to_string()))
    }
}
