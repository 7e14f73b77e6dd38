use axum::response::IntoResponse;
use axum::{Router, routing};

use crate::state::ServiceState;

pub fn router() -> Router<ServiceState> {
    Router::new()
        .route("/health", routing::get(health))
        .route("/ready", routing::get(ready))
}

async fn health() -> impl IntoResponse {
    "OK"
}

async fn ready() -> impl IntoResponse {
    "OK"
}
