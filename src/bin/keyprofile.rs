//! keyprofile CLI - configure API key profiles
//!
//! Stores a secret API key and a device name per profile in a TOML
//! configuration file, and can launch the external mock API server.

use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use keyprofile::configure::{ConfigureCommand, show_profile};
use keyprofile::error::Result;
use keyprofile::mock::{MockOptions, MockServer};
use keyprofile::profile::{DEFAULT_PROFILE, ProfileStore};
use keyprofile::prompt::stdin_source;

#[derive(Parser)]
#[command(name = "keyprofile")]
#[command(version)]
#[command(about = "Configure API key profiles.", long_about = None)]
struct Cli {
    /// Path to the configuration file (default: $XDG_CONFIG_HOME/keyprofile/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add your test mode secret API key to a profile.
    ///
    /// By default the key is stored in the "default" profile. Use
    /// --project-name to keep several API keys side by side. You will also
    /// be asked for a name identifying this device.
    Configure {
        /// Profile to store the API key in
        #[arg(long, short = 'p', value_name = "NAME", default_value = DEFAULT_PROFILE)]
        project_name: String,
    },

    /// Show a configured profile with its API key redacted
    Show {
        /// Profile to show
        #[arg(long, short = 'p', value_name = "NAME", default_value = DEFAULT_PROFILE)]
        project_name: String,
    },

    /// Start a stripe-mock server
    #[command(after_help = "Example: keyprofile mock --https-port 1212")]
    Mock(MockArgs),
}

#[derive(Args)]
struct MockArgs {
    /// Run with HTTP
    #[arg(long)]
    http: bool,

    /// Host and port to listen on for HTTP as <ip>:<port>
    #[arg(long, value_name = "ADDR")]
    http_addr: Option<String>,

    /// Port to listen on for HTTP; same as --http-addr :<port>
    #[arg(long, value_name = "PORT")]
    http_port: Option<u16>,

    /// Unix socket to listen on for HTTP
    #[arg(long, value_name = "PATH")]
    http_unix: Option<PathBuf>,

    /// Run with HTTPS; also enables HTTP/2
    #[arg(long)]
    https: bool,

    /// Host and port to listen on for HTTPS as <ip>:<port>
    #[arg(long, value_name = "ADDR")]
    https_addr: Option<String>,

    /// Port to listen on for HTTPS; same as --https-addr :<port>
    #[arg(long, value_name = "PORT")]
    https_port: Option<u16>,

    /// Unix socket to listen on for HTTPS
    #[arg(long, value_name = "PATH")]
    https_unix: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,

    /// Unix socket to listen on
    #[arg(long, value_name = "PATH")]
    unix: Option<PathBuf>,

    /// Path to fixtures to use instead of bundled version (JSON)
    #[arg(long, value_name = "FILE")]
    fixtures: Option<PathBuf>,

    /// Path to OpenAPI spec to use instead of bundled version (JSON)
    #[arg(long, value_name = "FILE")]
    spec: Option<PathBuf>,

    /// Error if the requested API version doesn't match the OpenAPI spec
    #[arg(long)]
    strict_version_check: bool,

    /// Show the mock server version and exit
    #[arg(long = "version")]
    show_version: bool,
}

impl From<MockArgs> for MockOptions {
    fn from(args: MockArgs) -> Self {
        MockOptions {
            http: args.http,
            http_addr: args.http_addr,
            http_port: args.http_port,
            http_unix_socket: args.http_unix,
            https: args.https,
            https_addr: args.https_addr,
            https_port: args.https_port,
            https_unix_socket: args.https_unix,
            port: args.port,
            unix_socket: args.unix,
            fixtures_path: args.fixtures,
            spec_path: args.spec,
            strict_version_check: args.strict_version_check,
            show_version: args.show_version,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Configure { project_name } => {
            let store = open_store(cli.config)?;
            let mut input = stdin_source();
            ConfigureCommand::new(&store, &project_name).run(&mut *input, &mut io::stdout())
        }
        Commands::Show { project_name } => {
            let store = open_store(cli.config)?;
            show_profile(&store, &project_name, &mut io::stdout())
        }
        Commands::Mock(args) => {
            // Runs until the mock server exits or the process is terminated.
            MockServer::new(args.into())?.start()?.wait()
        }
    }
}

fn open_store(config: Option<PathBuf>) -> Result<ProfileStore> {
    match config {
        Some(path) => Ok(ProfileStore::new(path)),
        None => ProfileStore::from_env(),
    }
}
