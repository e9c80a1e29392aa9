//! keyprofile - API key profile configuration for a command-line API client

#![forbid(unsafe_code)]

pub mod configure;
pub mod device;
pub mod error;
pub mod mock;
pub mod profile;
pub mod prompt;
pub mod redact;
pub mod validate;
