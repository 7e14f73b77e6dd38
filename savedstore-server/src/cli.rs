//! Command line interface of the savedstore server.

use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;

use crate::config::Config;
use crate::{healthcheck, observability, web};

/// Savedstore API webserver.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Healthcheck(HealthcheckCommand),
    Version(VersionCommand),
}

/// run the savedstore web server
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {}

/// perform a healthcheck against the running savedstore web server
///
/// This command checks if the server is available on the configured host and port. This is used
/// for Docker healthchecks.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "healthcheck")]
struct HealthcheckCommand {}

/// print the savedstore server version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;

    // Sentry should be initialized before creating the async runtime.
    let _sentry_guard = observability::init_sentry(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("main-rt")
        .enable_all()
        .worker_threads(config.runtime.worker_threads)
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    runtime.block_on(async move {
        match args.command {
            Command::Run(RunCommand {}) => web::server(config).await,
            Command::Healthcheck(HealthcheckCommand {}) => healthcheck::healthcheck(config).await,
            Command::Version(VersionCommand {}) => unreachable!(),
        }
    })
}
