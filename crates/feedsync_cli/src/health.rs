//! Liveness endpoint.

use std::net::SocketAddr;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

fn router() -> Router {
    Router::new().route("/healthz", get(healthz))
}

async fn healthz() -> &'static str {
    "ok"
}

/// Bind `addr` and serve `/healthz` until `cancel` fires.
pub(crate) async fn serve(addr: SocketAddr, cancel: CancellationToken) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Health endpoint listening on http://{addr}/healthz");
    serve_on(listener, cancel).await
}

async fn serve_on(listener: TcpListener, cancel: CancellationToken) -> std::io::Result<()> {
    axum::serve(listener, router())
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
