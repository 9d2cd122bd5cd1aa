//! Accept loop.
//!
//! # Responsibilities
//! - Accept connections until `stop` completes
//! - Skip per-connection accept failures, surface listener failures
//! - Hand the live connections to `Connections::drain` on the way out

use std::future::Future;
use std::io;

use axum::Router;
use tokio::net::TcpListener;

use crate::net::connection::{Connections, Drained};

/// Serve `app` on `listener` until `stop`, then drain until done or `force`.
///
/// Returns `Err` only when the listener itself fails; open connections are
/// aborted in that case.
pub async fn serve<S, F>(listener: TcpListener, app: Router, stop: S, force: F) -> io::Result<Drained>
where
    S: Future<Output = ()>,
    F: Future<Output = ()>,
{
    let mut connections = Connections::new();
    tokio::pin!(stop);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    tracing::trace!(peer = %remote, "Connection accepted");
                    connections.serve(stream, remote, app.clone());
                }
                Err(e) if is_connection_error(&e) => {
                    tracing::debug!(error = %e, "Connection dropped during accept");
                }
                Err(e) => return Err(e),
            },
            _ = connections.reap(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    tracing::debug!("Listener closed");
    Ok(connections.drain(force).await)
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::pending;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::routing::get;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::{oneshot, Notify};

    const REQUEST: &[u8] = b"GET / HTTP/1.1\r\nhost: localhost\r\n\r\n";

    fn app(entered: Arc<Notify>, delay: Duration) -> Router {
        Router::new().route(
            "/",
            get(move || {
                let entered = entered.clone();
                async move {
                    entered.notify_one();
                    tokio::time::sleep(delay).await;
                    "ok"
                }
            }),
        )
    }

    async fn bind() -> (TcpListener, std::net::SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn drain_without_connections_completes() {
        let (listener, _) = bind().await;
        let drained = serve(listener, Router::new(), async {}, pending()).await.unwrap();
        assert_eq!(drained, Drained::Completed);
    }

    #[tokio::test]
    async fn in_flight_request_completes_during_drain() {
        let (listener, addr) = bind().await;
        let entered = Arc::new(Notify::new());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(serve(
            listener,
            app(entered.clone(), Duration::from_millis(200)),
            async move {
                let _ = stop_rx.await;
            },
            pending(),
        ));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(REQUEST).await.unwrap();
        entered.notified().await;
        stop_tx.send(()).unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("ok"));

        assert_eq!(server.await.unwrap().unwrap(), Drained::Completed);
    }

    #[tokio::test]
    async fn force_aborts_stuck_connection() {
        let (listener, addr) = bind().await;
        let entered = Arc::new(Notify::new());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (force_tx, force_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(serve(
            listener,
            app(entered.clone(), Duration::from_secs(30)),
            async move {
                let _ = stop_rx.await;
            },
            async move {
                let _ = force_rx.await;
            },
        ));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(REQUEST).await.unwrap();
        entered.notified().await;
        stop_tx.send(()).unwrap();
        force_tx.send(()).unwrap();

        assert_eq!(server.await.unwrap().unwrap(), Drained::Forced(1));

        let mut response = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut response))
            .await
            .expect("socket should be closed");
        assert!(read.is_err() || response.is_empty());
    }
}
