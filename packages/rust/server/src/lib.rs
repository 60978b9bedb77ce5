//! HTTP surface for MiniLangFlow.
//!
//! Routes decode JSON bodies, hand them to [`FlowService`], and translate
//! [`FlowError`](minilangflow_shared::FlowError) into status codes: validation
//! failures become 400 with their message, everything else a generic 500.

pub mod api;
pub mod error;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use minilangflow_core::FlowService;
use minilangflow_shared::{FlowError, Result};

pub use api::{HEALTH_STATUS, create_router};
pub use error::{ApiError, INTERNAL_ERROR_MESSAGE};

/// Bind `addr` and serve the API until Ctrl-C.
pub async fn serve(addr: &str, service: Arc<FlowService>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| FlowError::Server(format!("cannot bind {addr}: {e}")))?;
    serve_on(listener, create_router(service), shutdown_signal()).await
}

/// Serve `router` on an already bound listener until `shutdown` resolves.
///
/// In-flight requests are allowed to finish before this returns.
pub async fn serve_on<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local: Option<SocketAddr> = listener.local_addr().ok();
    tracing::info!(addr = ?local, "MiniLangFlow API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| FlowError::Server(e.to_string()))?;

    tracing::info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
