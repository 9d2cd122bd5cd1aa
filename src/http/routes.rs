//! Route table.

use axum::{routing::get, Router};

/// The service's routes: a single liveness placeholder.
pub fn router() -> Router {
    Router::new().route("/", get(index))
}

async fn index() -> &'static str {
    "ok"
}
