//! Shutdown signal handling.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Complete when SIGINT or SIGTERM arrives, cancelling `token` on the way out.
///
/// Background loops watching `token` stop at the same moment the server
/// stops accepting connections.
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
        _ = token.cancelled() => info!("Shutdown requested"),
    }

    token.cancel();
    info!("web_server_shutting_down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_programmatic_cancel_completes() {
        let token = CancellationToken::new();
        let waiter = tokio::spawn(shutdown_signal(token.clone()));

        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("shutdown_signal did not complete")
            .unwrap();
        assert!(token.is_cancelled());
    }
}
