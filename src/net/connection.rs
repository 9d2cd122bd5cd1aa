//! Per-connection serving and tracking.

use std::future::Future;
use std::net::SocketAddr;

use axum::{body::Body, extract::ConnectInfo, http::Request, Router};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tower::ServiceExt;

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drained {
    /// Every connection finished on its own.
    Completed,
    /// The drain was cut short and this many connection tasks were aborted.
    Forced(usize),
}

/// Live connection tasks.
pub struct Connections {
    tasks: JoinSet<()>,
    graceful: GracefulShutdown,
}

impl Connections {
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            graceful: GracefulShutdown::new(),
        }
    }

    /// Serve `app` on `stream` in a tracked task.
    ///
    /// The peer address is exposed to handlers as `ConnectInfo<SocketAddr>`.
    pub fn serve(&mut self, stream: TcpStream, remote: SocketAddr, app: Router) {
        let service = app.map_request(move |mut req: Request<Incoming>| -> Request<Body> {
            req.extensions_mut().insert(ConnectInfo(remote));
            req.map(Body::new)
        });
        let watcher = self.graceful.watcher();

        self.tasks.spawn(async move {
            let builder = Builder::new(TokioExecutor::new());
            let conn = builder
                .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service));

            if let Err(e) = watcher.watch(conn).await {
                tracing::debug!(peer = %remote, error = %e, "Connection closed with error");
            }
        });
    }

    /// Connection tasks not yet collected.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Collect one finished connection task.
    pub async fn reap(&mut self) {
        if let Some(Err(e)) = self.tasks.join_next().await {
            if e.is_panic() {
                tracing::error!(error = %e, "Connection task panicked");
            }
        }
    }

    /// Ask every connection to finish; abort the rest once `force` completes.
    pub async fn drain(self, force: impl Future<Output = ()>) -> Drained {
        let Self { mut tasks, graceful } = self;
        tracing::debug!(connections = tasks.len(), "Draining connections");

        let drained = tokio::select! {
            _ = graceful.shutdown() => Drained::Completed,
            _ = force => Drained::Forced(tasks.len()),
        };

        // Aborts whatever is left and waits until the sockets are dropped.
        tasks.shutdown().await;
        drained
    }
}

impl Default for Connections {
    fn default() -> Self {
        Self::new()
    }
}
