//! Router assembly and the listening surface.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every path upgrades to the call protocol's WebSocket. The accept loop is
//! axum's: it accepts connections one at a time on a loopback listener and
//! spawns each one onto its own task, so sessions run concurrently with each
//! other and with the accept loop. Nothing joins those tasks.

pub mod ws;

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::registry::Registry;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind 127.0.0.1:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Router serving the WebSocket upgrade on every path.
pub fn app(registry: Registry) -> Router {
    Router::new()
        .route("/", get(ws::handle_ws))
        .fallback(ws::handle_ws)
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

/// Bind a listener on the loopback interface. Port 0 picks a free port.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the port cannot be bound.
pub async fn bind(port: u16) -> Result<TcpListener, ServerError> {
    TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
        .await
        .map_err(|source| ServerError::Bind { port, source })
}

/// Accept connections on `listener` until `shutdown` resolves.
///
/// Shutdown stops the accept loop; sessions already running continue until
/// their peers close.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the accept loop fails.
pub async fn serve<F>(listener: TcpListener, registry: Registry, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, objects = ?registry.identifiers(), "netcall listening");
    }
    axum::serve(listener, app(registry))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)?;
    info!("netcall stopped accepting connections");
    Ok(())
}

/// Bind `127.0.0.1:port` and serve calls forever.
///
/// # Errors
///
/// Returns [`ServerError`] if binding or the accept loop fails.
pub async fn listen(port: u16, registry: Registry) -> Result<(), ServerError> {
    let listener = bind(port).await?;
    serve(listener, registry, std::future::pending()).await
}
