use anyhow::{Context, Result};
use axum::Router;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Wait for Ctrl+C or SIGTERM, then cancel `cancel_token`.
pub async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = cancel_token.cancelled() => return,
    }

    tracing::info!("Shutdown signal received, stopping...");
    cancel_token.cancel();
}

/// Serve `app` until `cancel` fires, then stop accepting connections and give
/// in-flight requests at most `grace` to finish.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
    grace: Duration,
) -> Result<()> {
    let shutdown = cancel.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    });

    tokio::select! {
        res = &mut server => {
            return res.context("Server task failed")?.context("Server error");
        }
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutting down HTTP server (grace period {:?})", grace);
    match tokio::time::timeout(grace, &mut server).await {
        Ok(res) => res.context("Server task failed")?.context("Server error"),
        Err(_) => {
            tracing::warn!("In-flight requests still running after {:?}, aborting", grace);
            server.abort();
            Ok(())
        }
    }
}
