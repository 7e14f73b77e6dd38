//! Logging and error-reporting initialization.

use sentry::integrations::tracing as sentry_tracing;
use tracing::Level;
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::config::{Config, LogFormat};

/// Initializes Sentry if a DSN is configured.
///
/// Must run before the async runtime is created.
pub fn init_sentry(config: &Config) -> Option<sentry::ClientInitGuard> {
    if !config.sentry.is_enabled() {
        return None;
    }

    Some(sentry::init(sentry::ClientOptions {
        dsn: config
            .sentry
            .dsn
            .as_ref()
            .and_then(|dsn| dsn.as_str().parse().ok()),
        environment: config.sentry.environment.clone().map(Into::into),
        enable_logs: true,
        sample_rate: config.sentry.sample_rate.unwrap_or(1.0),
        traces_sample_rate: config.sentry.traces_sample_rate.unwrap_or(0.01),
        ..Default::default()
    }))
}

/// Initializes the tracing subscriber.
pub fn init_tracing(config: &Config) {
    // Converts warnings into events and sends everything at or above
    // INFO as logs instead of breadcrumbs.
    let sentry_layer = config.sentry.is_enabled().then(|| {
        sentry_tracing::layer().event_filter(|metadata| match *metadata.level() {
            Level::ERROR | Level::WARN => {
                sentry_tracing::EventFilter::Event | sentry_tracing::EventFilter::Log
            }
            Level::INFO => sentry_tracing::EventFilter::Log,
            Level::DEBUG | Level::TRACE => sentry_tracing::EventFilter::Ignore,
        })
    });

    let env_filter = EnvFilter::builder()
        .with_default_directive(config.logging.level.into())
        .from_env_lossy();

    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let format = match effective_format(config.logging.format) {
        LogFormat::Json => format.json().boxed(),
        LogFormat::Pretty => format.pretty().boxed(),
        _ => format.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(format)
        .with(sentry_layer)
        .with(env_filter)
        .init();
}

fn effective_format(format: LogFormat) -> LogFormat {
    match format {
        LogFormat::Auto => {
            if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
                LogFormat::Pretty
            } else {
                LogFormat::Compact
            }
        }
        other => other,
    }
}
