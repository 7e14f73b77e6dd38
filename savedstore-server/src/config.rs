//! Configuration for the savedstore server.
//!
//! Configuration can be loaded from multiple sources with the following
//! precedence (highest to lowest):
//!
//! 1. Environment variables (prefixed with `SS__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! Environment variables use `SS__` as a prefix and double underscores
//! (`__`) to denote nested configuration structures. For example:
//!
//! - `SS__HTTP_ADDR=0.0.0.0:5601` sets the HTTP server address
//! - `SS__STORAGE__TYPE=opensearch` sets the storage type
//! - `SS__STORAGE__ENDPOINT=http://localhost:9200` sets its endpoint
//!
//! The equivalent YAML:
//!
//! ```yaml
//! http_addr: 0.0.0.0:5601
//!
//! storage:
//!   type: opensearch
//!   endpoint: http://localhost:9200
//!   index: .saved_objects
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use savedstore_service::DashboardAdmins;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "SS__";

/// Newtype around `String` that protects against accidental logging of
/// secrets in the configuration struct.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    /// The secret value.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

/// Storage backend configuration.
///
/// The `type` field in YAML or `__TYPE` in environment variables
/// determines which variant is used.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Storage {
    /// In-memory storage (type `"memory"`).
    ///
    /// Keeps all saved objects in process memory. Suitable for
    /// development and tests; nothing survives a restart.
    Memory,

    /// OpenSearch-compatible storage (type `"opensearch"`).
    ///
    /// ```yaml
    /// storage:
    ///   type: opensearch
    ///   endpoint: http://localhost:9200
    ///   index: .saved_objects
    /// ```
    OpenSearch {
        /// Endpoint URL of the search cluster.
        endpoint: String,

        /// Index holding the saved-object documents.
        index: String,
    },
}

/// Runtime configuration for the Tokio async runtime.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Runtime {
    /// Number of worker threads for the server runtime.
    ///
    /// Defaults to the number of CPU cores on the host machine. Set this
    /// in accordance with the resources available to the server,
    /// especially in Kubernetes environments.
    pub worker_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format: [`LogFormat::Pretty`] for a TTY,
    /// otherwise [`LogFormat::Compact`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Compact plain text output.
    Compact,

    /// Dump out JSON lines.
    Json,
}

/// Logging configuration.
///
/// Logs are always written to stderr. The `RUST_LOG` environment
/// variable provides more granular control per module if needed.
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// Valid levels in increasing severity: TRACE, DEBUG, INFO, WARN,
    /// ERROR, OFF. `DEBUG` and `TRACE` are very verbose; `INFO` is
    /// appropriate for production.
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// [Sentry](https://sentry.io/) error tracking configuration.
///
/// Sentry is disabled by default and only enabled when a DSN is provided.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Sentry {
    /// Sentry DSN (Data Source Name). When `None`, the integration is
    /// completely disabled.
    pub dsn: Option<ConfigSecret>,

    /// Environment name for this deployment (e.g. "production").
    pub environment: Option<String>,

    /// Error event sampling rate. `None` sends all errors.
    pub sample_rate: Option<f32>,

    /// Performance trace sampling rate. `None` sends 1% of traces.
    pub traces_sample_rate: Option<f32>,
}

impl Sentry {
    /// Returns whether Sentry integration is enabled.
    pub fn is_enabled(&self) -> bool {
        self.dsn.is_some()
    }
}

/// Authorization configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Auth {
    /// Whether an authentication interceptor is active.
    ///
    /// When `false` the deployment runs in "open" mode: requests carry
    /// no principals and every permission check passes. The `/status`
    /// endpoint reports this flag so the UI can hide permission
    /// controls entirely.
    pub enabled: bool,

    /// Principals that bypass all authorization checks.
    ///
    /// ```yaml
    /// auth:
    ///   enabled: true
    ///   dashboard_admins:
    ///     users: ["admin"]
    ///     groups: ["dashboard_admin"]
    /// ```
    pub dashboard_admins: DashboardAdmins,
}

/// Workspace-specific type restrictions.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Workspaces {
    /// Object types that may not be created inside a workspace.
    pub denied_object_types: Vec<String>,

    /// Object types that are global rather than workspace-scoped.
    pub agnostic_object_types: Vec<String>,
}

impl Default for Workspaces {
    fn default() -> Self {
        Self {
            denied_object_types: vec!["data-source".to_owned(), "config".to_owned()],
            agnostic_object_types: vec!["workspace".to_owned(), "config".to_owned()],
        }
    }
}

/// Main configuration struct for the savedstore server.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server bind address.
    ///
    /// Note that binding to `0.0.0.0` makes the server accessible from
    /// all network interfaces.
    pub http_addr: SocketAddr,

    /// Storage backend for saved objects.
    pub storage: Storage,

    /// Configuration of the internal task runtime.
    pub runtime: Runtime,

    /// Logging configuration.
    pub logging: Logging,

    /// Sentry error tracking configuration.
    pub sentry: Sentry,

    /// Authorization configuration.
    pub auth: Auth,

    /// Workspace type restrictions.
    pub workspaces: Workspaces,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:5601".parse().unwrap(),
            storage: Storage::Memory,
            runtime: Runtime::default(),
            logging: Logging::default(),
            sentry: Sentry::default(),
            auth: Auth::default(),
            workspaces: Workspaces::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the provided arguments.
    ///
    /// Configuration is merged in the following order (later sources
    /// override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided)
    /// 3. Environment variables (prefixed with `SS__`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use savedstore_types::principal::StringOrWildcard;

    use super::*;

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SS__HTTP_ADDR", "127.0.0.1:9999");
            jail.set_env("SS__STORAGE__TYPE", "opensearch");
            jail.set_env("SS__STORAGE__ENDPOINT", "http://localhost:9200");
            jail.set_env("SS__STORAGE__INDEX", ".saved_objects");
            jail.set_env("SS__AUTH__ENABLED", "true");
            jail.set_env("SS__SENTRY__DSN", "abcde");

            let config = Config::load(None).unwrap();

            assert_eq!(config.http_addr, "127.0.0.1:9999".parse().unwrap());
            let Storage::OpenSearch { endpoint, index } = &config.storage else {
                panic!("expected opensearch storage");
            };
            assert_eq!(endpoint, "http://localhost:9200");
            assert_eq!(index, ".saved_objects");
            assert!(config.auth.enabled);
            assert_eq!(config.sentry.dsn.as_ref().unwrap().as_str(), "abcde");

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            storage:
                type: opensearch
                endpoint: http://localhost:9200
                index: .saved_objects
            auth:
                enabled: true
                dashboard_admins:
                    users: ["admin"]
                    groups: ["dashboard_admin", "*"]
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            let Storage::OpenSearch { endpoint, .. } = &config.storage else {
                panic!("expected opensearch storage");
            };
            assert_eq!(endpoint, "http://localhost:9200");

            assert!(config.auth.enabled);
            assert_eq!(
                config.auth.dashboard_admins.users,
                vec![StringOrWildcard::String("admin".into())]
            );
            assert_eq!(
                config.auth.dashboard_admins.groups,
                vec![
                    StringOrWildcard::String("dashboard_admin".into()),
                    StringOrWildcard::Wildcard
                ]
            );

            Ok(())
        });
    }

    #[test]
    fn env_overrides_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            storage:
                type: opensearch
                endpoint: http://localhost:9200
                index: .saved_objects
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("SS__STORAGE__ENDPOINT", "http://localhost:9201");

            let config = Config::load(Some(tempfile.path())).unwrap();

            let Storage::OpenSearch { endpoint, .. } = &config.storage else {
                panic!("expected opensearch storage");
            };
            assert_eq!(endpoint, "http://localhost:9201");

            Ok(())
        });
    }

    #[test]
    fn defaults_are_open_mode_with_memory_storage() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert!(matches!(config.storage, Storage::Memory));
            assert!(!config.auth.enabled);
            assert!(config.auth.dashboard_admins.users.is_empty());
            assert!(
                config
                    .workspaces
                    .denied_object_types
                    .contains(&"data-source".to_string())
            );

            Ok(())
        });
    }
}
