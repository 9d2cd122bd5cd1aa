//! Per-request panic recovery.
//!
//! A panic inside one handler becomes a `500` for that request only; the
//! connection task and the server keep running. A process-wide panic hook
//! records where the panic happened and its backtrace while a request is
//! being handled, so the recovery log points at the failing code.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;

use crate::http::middleware::request_id;

tokio::task_local! {
    static PANIC_SITE: RefCell<Option<PanicSite>>;
}

/// Where a panic was raised.
#[derive(Debug, Clone)]
struct PanicSite {
    location: String,
    backtrace: String,
}

/// A panic caught while running a request.
#[derive(Debug, Clone)]
pub struct PanicReport {
    pub message: String,
    /// `file:line:column` of the panic, when the hook saw it.
    pub location: Option<String>,
    pub backtrace: Option<String>,
}

pub async fn recover(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let headers = req.headers().clone();

    match catch_panic(next.run(req)).await {
        Ok(response) => response,
        Err(report) => {
            tracing::error!(
                method = %method,
                uri = %uri,
                request_id = %request_id(&headers),
                headers = ?redacted(&headers),
                error = %report.message,
                location = report.location.as_deref().unwrap_or("<unknown>"),
                backtrace = report.backtrace.as_deref().unwrap_or(""),
                "Recovered from panic in request handler"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Run `fut`, turning a panic into a `PanicReport`.
pub async fn catch_panic<F: Future>(fut: F) -> Result<F::Output, PanicReport> {
    install_panic_hook();

    PANIC_SITE
        .scope(RefCell::new(None), async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(output) => Ok(output),
                Err(payload) => {
                    let site = PANIC_SITE.with(|slot| slot.borrow_mut().take());
                    Err(PanicReport {
                        message: panic_message(payload.as_ref()).to_string(),
                        location: site.as_ref().map(|s| s.location.clone()),
                        backtrace: site.map(|s| s.backtrace),
                    })
                }
            }
        })
        .await
}

/// Record panics raised under `catch_panic`; defer to the previous hook otherwise.
fn install_panic_hook() {
    static INSTALL: Once = Once::new();

    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let site = || PanicSite {
                location: info
                    .location()
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "<unknown>".to_string()),
                backtrace: Backtrace::force_capture().to_string(),
            };
            let recorded = PANIC_SITE.try_with(|slot| {
                *slot.borrow_mut() = Some(site());
            });
            if recorded.is_err() {
                previous(info);
            }
        }));
    });
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

fn redacted(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if *name == header::AUTHORIZATION || *name == header::COOKIE {
                "<redacted>".to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.to_string(), value)
        })
        .collect()
}
