//! Request middleware.
//!
//! Applied outermost first: request id → access log → recover → timeout.

pub mod access_log;
pub mod recover;

pub use access_log::access_log;
pub use recover::recover;

use axum::http::HeaderMap;

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The request id set by the request-id layer, or `-` when absent.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}
