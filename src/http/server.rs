//! HTTP application assembly.
//!
//! # Responsibilities
//! - Wrap a route table with the middleware stack
//! - Tag each request with an `x-request-id` (UUID v4), echoed on the response
//! - Log every request, recover from handler panics, bound request time

use std::time::Duration;

use axum::{http::StatusCode, middleware, Router};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

use crate::config::AppConfig;
use crate::http::middleware::{access_log, recover};

/// Add the middleware stack to `routes`.
///
/// Requests running longer than `server.request_timeout_secs` get `408`.
pub fn build_app(routes: Router, config: &AppConfig) -> Router {
    routes.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(middleware::from_fn(access_log))
            .layer(middleware::from_fn(recover))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.server.request_timeout_secs),
            )),
    )
}
