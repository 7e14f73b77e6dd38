//! Shared server state.

use std::sync::Arc;

use savedstore_service::{
    AccessControl, DashboardAdmins, InMemoryBackend, RemoteBackend, SavedObjectRepository,
    WorkspaceScoping,
};
use tokio::sync::watch;

use crate::config::{Config, Storage};

/// Shared reference to the server [state](State).
pub type ServiceState = Arc<State>;

/// Reference to the savedstore business logic.
///
/// This structure is created during server startup and shared with all
/// HTTP request handlers. In request handlers, use
/// `axum::extract::State<ServiceState>` to retrieve a shared reference
/// to this structure.
#[derive(Debug)]
pub struct State {
    /// The server configuration.
    pub config: Config,

    /// Factory for per-request access-controlled clients.
    pub access: AccessControl,

    /// Publisher side of the dashboard-admin configuration stream.
    ///
    /// The authorization layer subscribes to this channel and caches
    /// the latest value; until the first value is published nobody is a
    /// dashboard admin.
    pub dashboard_admins: watch::Sender<DashboardAdmins>,
}

impl State {
    /// Spawns all services and background tasks for savedstore.
    pub async fn new(config: Config) -> anyhow::Result<ServiceState> {
        let repository = match &config.storage {
            Storage::Memory => SavedObjectRepository::new(Box::new(InMemoryBackend::new())),
            Storage::OpenSearch { endpoint, index } => {
                SavedObjectRepository::new(Box::new(RemoteBackend::new(endpoint, index)))
            }
        };

        let scoping = WorkspaceScoping::new(
            config.workspaces.denied_object_types.iter().cloned(),
            config.workspaces.agnostic_object_types.iter().cloned(),
        );

        let (dashboard_admins, admins_rx) = watch::channel(DashboardAdmins::default());
        let access = AccessControl::new(repository, scoping, admins_rx);

        let state = Arc::new(Self {
            config,
            access,
            dashboard_admins,
        });

        tokio::spawn(publish_dashboard_admins(state.clone()));

        Ok(state)
    }
}

/// Publishes the configured dashboard-admin list onto the stream.
///
/// Readers tolerate "not yet arrived" by treating the channel default as
/// "no dashboard admins"; this task delivers the first real value.
async fn publish_dashboard_admins(state: ServiceState) {
    let admins = state.config.auth.dashboard_admins.clone();
    if state.dashboard_admins.send(admins).is_err() {
        tracing::warn!("dashboard admin subscribers already gone");
    }
}
