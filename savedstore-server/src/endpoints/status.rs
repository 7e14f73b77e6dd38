use axum::extract::State;
use axum::{Json, Router, routing};
use serde::Serialize;

use crate::state::ServiceState;

pub fn router() -> Router<ServiceState> {
    Router::new().route("/status", routing::get(status))
}

/// Whether permission control is active, consumed by the UI to decide
/// whether to show permission controls at all.
#[derive(Debug, Serialize)]
struct StatusResponse {
    enabled: bool,
}

async fn status(State(state): State<ServiceState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        enabled: state.config.auth.enabled,
    })
}
