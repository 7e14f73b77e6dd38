//! Contains all HTTP endpoint handlers.
//!
//! Use [`routes`] to create a router with all endpoints. The API is
//! mounted twice: at the root and under `/w/{workspace_id}`, so that
//! requests can carry an ambient workspace in their path.

use axum::Router;
use serde::Serialize;

use crate::state::ServiceState;

mod health;
mod saved_objects;
mod status;
mod workspaces;

/// The `{ success: true, result }` envelope for successful responses.
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    success: bool,
    result: T,
}

impl<T> SuccessResponse<T> {
    fn new(result: T) -> Self {
        Self {
            success: true,
            result,
        }
    }
}

/// Builds the router with all endpoints.
pub fn routes() -> Router<ServiceState> {
    let api = Router::new()
        .merge(workspaces::router())
        .merge(saved_objects::router())
        .merge(status::router());

    Router::new()
        .merge(health::router())
        .merge(api.clone())
        .nest("/w/{workspace_id}", api)
}
