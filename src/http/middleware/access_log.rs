//! Access logging.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    http::header::USER_AGENT,
    middleware::Next,
    response::Response,
};

use crate::http::middleware::request_id;
use crate::observability::metrics;

/// Log one line per request and record request metrics.
pub async fn access_log(req: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or_default().to_string();
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let request_id = request_id(req.headers()).to_string();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    tracing::info!(
        target: "access",
        status,
        method = %method,
        path = %path,
        query = %query,
        ip = %ip,
        user_agent = %user_agent,
        request_id = %request_id,
        cost = ?start.elapsed(),
        "{}",
        path
    );
    metrics::record_request(method.as_str(), status, start);

    response
}
