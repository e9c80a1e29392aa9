//! Launching the external stripe-mock server
//!
//! The mock server is a separate program. This module only checks that the
//! requested listeners do not conflict, translates the options to the mock
//! server's own flags, and supervises the child process.

use crate::error::{ErrorCategory, ErrorKind, KeyprofileError, Result};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use tracing::{debug, info};

/// Environment variable naming the mock server executable.
pub const MOCK_BIN_ENV: &str = "KEYPROFILE_MOCK_BIN";

/// Executable looked up on `PATH` when [`MOCK_BIN_ENV`] is unset.
pub const DEFAULT_MOCK_BIN: &str = "stripe-mock";

/// Listener and data options passed through to the mock server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockOptions {
    pub http: bool,
    pub http_addr: Option<String>,
    pub http_port: Option<u16>,
    pub http_unix_socket: Option<PathBuf>,
    pub https: bool,
    pub https_addr: Option<String>,
    pub https_port: Option<u16>,
    pub https_unix_socket: Option<PathBuf>,
    pub port: Option<u16>,
    pub unix_socket: Option<PathBuf>,
    pub fixtures_path: Option<PathBuf>,
    pub spec_path: Option<PathBuf>,
    pub strict_version_check: bool,
    pub show_version: bool,
}

impl MockOptions {
    /// Reject listener combinations the mock server cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.port.is_some() && self.unix_socket.is_some() {
            return Err(options_error("please specify only one of --port or --unix"));
        }

        let http_listeners = [
            self.http_addr.is_some(),
            self.http_port.is_some(),
            self.http_unix_socket.is_some(),
        ];
        if count_set(&http_listeners) > 1 {
            return Err(options_error(
                "please specify only one of --http-addr, --http-port, or --http-unix",
            ));
        }

        let https_listeners = [
            self.https_addr.is_some(),
            self.https_port.is_some(),
            self.https_unix_socket.is_some(),
        ];
        if count_set(&https_listeners) > 1 {
            return Err(options_error(
                "please specify only one of --https-addr, --https-port, or --https-unix",
            ));
        }

        let global_listener = self.port.is_some() || self.unix_socket.is_some();
        let specific_listener = count_set(&http_listeners) + count_set(&https_listeners) > 0;
        if global_listener && specific_listener {
            return Err(options_error(
                "please use either --port/--unix or the protocol-specific listener options, not both",
            ));
        }

        Ok(())
    }

    /// The mock server's command-line arguments for these options.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args = Args::default();
        args.flag("-http", self.http);
        args.value("-http-addr", self.http_addr.as_ref());
        args.value("-http-port", self.http_port.map(|p| p.to_string()).as_ref());
        args.value("-http-unix", self.http_unix_socket.as_ref());
        args.flag("-https", self.https);
        args.value("-https-addr", self.https_addr.as_ref());
        args.value("-https-port", self.https_port.map(|p| p.to_string()).as_ref());
        args.value("-https-unix", self.https_unix_socket.as_ref());
        args.value("-port", self.port.map(|p| p.to_string()).as_ref());
        args.value("-unix", self.unix_socket.as_ref());
        args.value("-fixtures", self.fixtures_path.as_ref());
        args.value("-spec", self.spec_path.as_ref());
        args.flag("-strict-version-check", self.strict_version_check);
        args.flag("-version", self.show_version);
        args.0
    }
}

#[derive(Default)]
struct Args(Vec<OsString>);

impl Args {
    fn flag(&mut self, name: &str, enabled: bool) {
        if enabled {
            self.0.push(name.into());
        }
    }

    fn value<V: Into<OsString> + Clone>(&mut self, name: &str, value: Option<&V>) {
        if let Some(value) = value {
            self.0.push(name.into());
            self.0.push(value.clone().into());
        }
    }
}

fn count_set(flags: &[bool]) -> usize {
    flags.iter().filter(|&&set| set).count()
}

/// A validated mock server configuration, ready to start
#[derive(Debug)]
pub struct MockServer {
    program: OsString,
    options: MockOptions,
}

impl MockServer {
    /// Validate `options` and locate the executable from the environment.
    pub fn new(options: MockOptions) -> Result<Self> {
        let program =
            std::env::var_os(MOCK_BIN_ENV).unwrap_or_else(|| OsString::from(DEFAULT_MOCK_BIN));
        Self::with_program(program, options)
    }

    /// Validate `options` for a specific executable.
    pub fn with_program(program: impl Into<OsString>, options: MockOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            program: program.into(),
            options,
        })
    }

    /// Spawn the mock server. It keeps running until stopped or it exits.
    pub fn start(&self) -> Result<RunningMock> {
        let args = self.options.to_args();
        debug!(program = ?self.program, ?args, "starting mock server");
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| {
                KeyprofileError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::MockServer,
                    format!(
                        "failed to start mock server {}: {}",
                        self.program.to_string_lossy(),
                        e
                    ),
                    e,
                )
            })?;
        info!(pid = child.id(), "mock server started");
        Ok(RunningMock { child })
    }
}

/// Handle to a running mock server process
#[derive(Debug)]
pub struct RunningMock {
    child: Child,
}

impl RunningMock {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Block until the server exits. Any exit other than success is an error,
    /// which covers failing to bind its listeners.
    pub fn wait(mut self) -> Result<()> {
        let status = self.child.wait().map_err(server_error)?;
        if status.success() {
            Ok(())
        } else {
            Err(KeyprofileError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::MockServer,
                format!("mock server exited unsuccessfully ({})", status),
            ))
        }
    }

    /// Terminate the server if it is still running and reap it.
    pub fn stop(mut self) -> Result<()> {
        if self.child.try_wait().map_err(server_error)?.is_some() {
            return Ok(());
        }
        self.child.kill().map_err(server_error)?;
        self.child.wait().map_err(server_error)?;
        info!("mock server stopped");
        Ok(())
    }
}

fn options_error(msg: &str) -> KeyprofileError {
    KeyprofileError::with_kind(
        ErrorCategory::User,
        ErrorKind::MockOptions,
        format!("invalid options: {}", msg),
    )
}

fn server_error(e: std::io::Error) -> KeyprofileError {
    KeyprofileError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::MockServer,
        format!("failed to supervise mock server: {}", e),
        e,
    )
}
